//! Per-bank statement layouts.
//!
//! Each detected bank code maps to a [`BankLayout`] describing where the
//! movements table starts and ends, which lines are furniture, how two-amount
//! lines are signed and what a reference number looks like. Banks without an
//! entry use [`GENERIC`].

use crate::extract::bank::contains_word;

/// How dates appear on movement lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `dd/mm`, `dd/mm/yy` or `dd/mm/yyyy` leading the line.
    Numeric,
    /// `06-MAR` anywhere in the line. Lines without amounts are detail
    /// continuations of the next movement.
    DayMonthName,
}

/// How the movement amount of an `amount balance` line is signed when no
/// keyword decides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignRule {
    /// Debit when the running balance went down, else by sign.
    BalanceDelta,
    /// Debit only when the amount is printed negative.
    AmountSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Debit,
    Credit,
}

#[derive(Debug)]
pub struct BankLayout {
    pub code: &'static str,
    /// Movements are read only after one of these markers. Empty means the
    /// whole document.
    pub table_start: &'static [&'static str],
    /// Stops movement parsing for the rest of the document.
    pub table_end: &'static [&'static str],
    /// Lines containing any of these are skipped.
    pub skip: &'static [&'static str],
    pub debit_keywords: &'static [&'static str],
    pub credit_keywords: &'static [&'static str],
    /// Digit count range of a reference token.
    pub reference_digits: (usize, usize),
    pub dates: DateStyle,
    pub sign: SignRule,
}

pub static GENERIC: BankLayout = BankLayout {
    code: "GENERICO",
    table_start: &[],
    table_end: &[],
    skip: &[],
    debit_keywords: &[],
    credit_keywords: &[],
    reference_digits: (4, 12),
    dates: DateStyle::Numeric,
    sign: SignRule::BalanceDelta,
};

/// Specific variants come before the bank they refine.
static LAYOUTS: &[BankLayout] = &[
    BankLayout {
        code: "GALICIA_MAS",
        table_start: &["DETALLE DE OPERACIONES"],
        table_end: &[],
        skip: &["FECHA DESCRIPCION", "FECHA DESCRIPCIÓN"],
        debit_keywords: &[],
        credit_keywords: &[],
        reference_digits: (6, 12),
        dates: DateStyle::DayMonthName,
        sign: SignRule::BalanceDelta,
    },
    BankLayout {
        code: "GALICIA",
        table_start: &[],
        table_end: &[],
        skip: &["FECHA DESCRIPCION", "FECHA DESCRIPCIÓN"],
        debit_keywords: &[],
        credit_keywords: &[],
        reference_digits: (4, 12),
        dates: DateStyle::Numeric,
        sign: SignRule::AmountSign,
    },
    BankLayout {
        code: "MERCADOPAGO",
        table_start: &["DETALLE DE MOVIMIENTOS"],
        table_end: &[],
        skip: &["FECHA", "DESCRIPCION", "DESCRIPCIÓN"],
        debit_keywords: &["PAGO", "COMPRA", "EXTRACCION", "EXTRACCIÓN", "ENVIADA", "ENVIA", "SALIDA"],
        credit_keywords: &[
            "TRANSFERENCIA RECIBIDA",
            "ACREDITACION",
            "ACREDITACIÓN",
            "ENTRADA",
            "RENDIMIENTOS",
            "CARGA SALDO",
            "INGRESO",
        ],
        reference_digits: (10, 15),
        dates: DateStyle::Numeric,
        sign: SignRule::AmountSign,
    },
    BankLayout {
        code: "COMAFI",
        table_start: &["DETALLE DE MOVIMIENTOS", "FECHA CONCEPTOS"],
        table_end: &[
            "IMPUESTOS DEBITADOS EN EL PERIODO",
            "IMPUESTOS DEBITADOS EN EL PERÍODO",
            "CUENTA CORRIENTE ESPECIAL",
            "TRANSFERENCIAS ELECTRONICAS",
            "TRANSFERENCIAS ELECTRÓNICAS",
        ],
        skip: &[
            "SE RUEGA FORMULAR",
            "LOS DEPOSITOS EN PESOS",
            "LOS DEPÓSITOS EN PESOS",
            "LEY 26.361",
            "BASE IMPONIBLE",
            "TOTAL AL:",
            "CBU:",
            "SIN MOVIMIENTOS",
        ],
        debit_keywords: &[
            "IMPUESTO",
            "IVA",
            "PERCEPCION",
            "PERCEPCIÓN",
            "DEBITO",
            "DÉBITO",
            "SERVICIO",
            "TASA",
            "CANON",
            "LEASING",
            "MANTENIMIENTO",
            "COMISION",
            "COMISIÓN",
        ],
        credit_keywords: &[
            "TRANSFERENCIA RECIBIDA",
            "ACREDITACION",
            "ACREDITACIÓN",
            "DEPOSITO",
            "DEPÓSITO",
            "DEVOLUCION",
            "DEVOLUCIÓN",
        ],
        reference_digits: (10, 20),
        dates: DateStyle::Numeric,
        sign: SignRule::BalanceDelta,
    },
    BankLayout {
        code: "MACRO",
        table_start: &[],
        table_end: &[],
        skip: &[
            "TOTAL COBRADO DEL IMP",
            "D. 409/2018",
            "S.E.U.O.",
            "CASA CENTRAL",
            "HOJA NRO",
            "PERIODO DEL EXTRACTO",
            "SALDOS CONSOLIDADOS",
        ],
        debit_keywords: &[
            "N/D",
            "DEBITO",
            "DB",
            "RETENCION",
            "SIRCREB",
            "IMPUESTO",
            "COMISION",
            "MANTENIMIENTO",
            "IVA",
            "SELLOS",
            "PAGO DE CHEQUE",
        ],
        credit_keywords: &[
            "N/C",
            "ACRED",
            "DEPOSITO",
            "PRISMA",
            "LIQ COMER",
            "TRANSFERENCIA",
            "TRANSF",
        ],
        reference_digits: (4, 14),
        dates: DateStyle::Numeric,
        sign: SignRule::BalanceDelta,
    },
    BankLayout {
        code: "SANTANDER",
        table_start: &[],
        table_end: &["DETALLE IMPOSITIVO", "SALVO ERROR"],
        skip: &["FECHA COMPROBANTE MOVIMIENTO", "DEBITO CREDITO SALDO", "SALDO TOTAL", "PERIODO"],
        debit_keywords: &[],
        credit_keywords: &[],
        reference_digits: (4, 12),
        dates: DateStyle::Numeric,
        sign: SignRule::BalanceDelta,
    },
    BankLayout {
        code: "ICBC",
        table_start: &[],
        table_end: &[],
        skip: &[
            "FECHA CONCEPTO",
            "INFORMACION SOBRE SU CUENTA",
            "TOTAL DEBITOS",
            "TOTAL CREDITOS",
            "TOTAL CRÉDITOS",
            "SUBTOTAL",
        ],
        debit_keywords: &[],
        credit_keywords: &[],
        reference_digits: (6, 15),
        dates: DateStyle::Numeric,
        sign: SignRule::BalanceDelta,
    },
];

/// Layout for a detected bank code, or [`GENERIC`].
pub fn layout_for(code: &str) -> &'static BankLayout {
    LAYOUTS.iter().find(|l| l.code == code).unwrap_or(&GENERIC)
}

impl BankLayout {
    pub fn starts_table(&self, upper: &str) -> bool {
        self.table_start.iter().any(|m| upper.contains(m))
    }

    pub fn ends_table(&self, upper: &str) -> bool {
        self.table_end.iter().any(|m| upper.contains(m))
    }

    pub fn is_furniture(&self, upper: &str) -> bool {
        self.skip.iter().any(|m| upper.contains(m))
    }

    /// Direction forced by a keyword in the description. When both lists
    /// match, the longest keyword wins.
    pub fn keyword_direction(&self, description: &str) -> Option<Direction> {
        let upper = description.to_uppercase();
        let longest = |keywords: &[&str]| {
            keywords
                .iter()
                .filter(|k| contains_word(&upper, k))
                .map(|k| k.len())
                .max()
        };

        match (longest(self.debit_keywords), longest(self.credit_keywords)) {
            (Some(d), Some(c)) if c > d => Some(Direction::Credit),
            (Some(_), _) => Some(Direction::Debit),
            (None, Some(_)) => Some(Direction::Credit),
            (None, None) => None,
        }
    }

    pub fn is_reference(&self, token: &str) -> bool {
        let (min, max) = self.reference_digits;
        (min..=max).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_digit())
    }
}
