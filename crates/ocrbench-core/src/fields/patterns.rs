//! Default field patterns for Mexican legal requirement documents.
//!
//! Patterns run against uppercased, whitespace-collapsed text. Within each
//! list the most specific (labelled) form comes first.

use lazy_static::lazy_static;
use regex::Regex;

const MONTHS: &str = "ENERO|FEBRERO|MARZO|ABRIL|MAYO|JUNIO|JULIO|AGOSTO|SEPTIEMBRE|OCTUBRE|NOVIEMBRE|DICIEMBRE";

/// "NO.", "NUM.", "NÚM", "NUMERO:" and similar before a number.
const NUMBER_PREFIX: &str = r"(?:N[OUÚ]M(?:ERO)?\.?|NO\.)\s*:?\s*";

/// Ends a free-text label value: the next known label, any single-word
/// label, or the end of the text.
const NEXT_LABEL: &str = r"(?: (?:TIPO DE REQUERIMIENTO|AUTORIDAD EMISORA|FECHA DE EMISI[OÓ]N|N[UÚ]MERO DE OFICIO|N[UÚ]MERO DE EXPEDIENTE|R\.F\.C\.|[A-ZÁÉÍÓÚÑ]+):|$)";

lazy_static! {
    // Dates
    pub static ref FECHA_LABELED_ISO: Regex = Regex::new(
        r"FECHA:?\s*(\d{4}-\d{2}-\d{2})"
    ).unwrap();

    pub static ref FECHA_LABELED_DMY: Regex = Regex::new(
        r"FECHA:?\s*(\d{2}[-/]\d{2}[-/]\d{4})"
    ).unwrap();

    pub static ref FECHA_ISO: Regex = Regex::new(
        r"\b(\d{4}-\d{2}-\d{2})\b"
    ).unwrap();

    pub static ref FECHA_DMY: Regex = Regex::new(
        r"\b(\d{2}/\d{2}/\d{4})\b"
    ).unwrap();

    pub static ref FECHA_LONG: Regex = Regex::new(
        &format!(r"\b(\d{{1,2}} DE (?:{}) DE \d{{4}})\b", MONTHS)
    ).unwrap();

    // Issuing authority
    pub static ref AUTORIDAD_LABELED: Regex = Regex::new(
        &format!(r"AUTORIDAD(?: EMISORA)?:\s*([^:]+?){}", NEXT_LABEL)
    ).unwrap();

    pub static ref AUTORIDAD_FULL_NAME: Regex = Regex::new(
        r"(SERVICIO DE ADMINISTRACI[OÓ]N TRIBUTARIA|COMISI[OÓ]N NACIONAL BANCARIA Y DE VALORES|UNIDAD DE INTELIGENCIA FINANCIERA|FISCAL[IÍ]A GENERAL DE LA REP[UÚ]BLICA|SECRETAR[IÍ]A DE HACIENDA Y CR[EÉ]DITO P[UÚ]BLICO)"
    ).unwrap();

    pub static ref AUTORIDAD_ACRONYM: Regex = Regex::new(
        r"\b(SAT|CNBV|UIF|FGR|IMSS|INFONAVIT|SHCP|PGR)\b"
    ).unwrap();

    // Case and office numbers
    pub static ref EXPEDIENTE_LABELED: Regex = Regex::new(
        &format!(r"EXPEDIENTE:?\s*(?:{})?([A-Z0-9/\-\.]*\d[A-Z0-9/\-\.]*)", NUMBER_PREFIX)
    ).unwrap();

    pub static ref EXPEDIENTE_SHORT: Regex = Regex::new(
        r"\bEXP\.\s*([A-Z0-9][A-Z0-9/\-\.]*)"
    ).unwrap();

    pub static ref OFICIO_LABELED: Regex = Regex::new(
        &format!(r"OFICIO:?\s*(?:{})?([A-Z0-9/\-\.]*\d[A-Z0-9/\-\.]*)", NUMBER_PREFIX)
    ).unwrap();

    // Requirement type
    pub static ref TIPO_LABELED: Regex = Regex::new(
        &format!(r"TIPO(?: DE REQUERIMIENTO)?:\s*([^:]+?){}", NEXT_LABEL)
    ).unwrap();

    pub static ref TIPO_KEYWORD: Regex = Regex::new(
        r"\b(ASEGURAMIENTO|DESBLOQUEO|TRANSFERENCIA|SITUACI[OÓ]N DE FONDOS|SOLICITUD DE INFORMACI[OÓ]N|EMBARGO)\b"
    ).unwrap();

    // Tax id (RFC): 3-4 letters, 6 digit date, 3 character homoclave
    pub static ref RFC_LABELED: Regex = Regex::new(
        r"\bR\.?F\.?C\.?:?\s*([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})\b"
    ).unwrap();

    pub static ref RFC_STANDALONE: Regex = Regex::new(
        r"\b([A-ZÑ&]{3,4}\d{6}[A-Z0-9]{3})\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
        re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
    }

    #[test]
    fn test_dates() {
        assert_eq!(capture(&FECHA_LABELED_ISO, "FECHA: 2024-01-15"), Some("2024-01-15"));
        assert_eq!(capture(&FECHA_LABELED_DMY, "FECHA 15/01/2024"), Some("15/01/2024"));
        assert_eq!(capture(&FECHA_ISO, "EMITIDO 2023-12-31 EN CDMX"), Some("2023-12-31"));
        assert_eq!(
            capture(&FECHA_LONG, "CIUDAD DE MÉXICO, A 5 DE MARZO DE 2024"),
            Some("5 DE MARZO DE 2024")
        );
    }

    #[test]
    fn test_labeled_authority_stops_at_next_label() {
        assert_eq!(
            capture(&AUTORIDAD_LABELED, "AUTORIDAD EMISORA: JUZGADO TERCERO CIVIL EXPEDIENTE: 12/2024"),
            Some("JUZGADO TERCERO CIVIL")
        );
        assert_eq!(capture(&AUTORIDAD_LABELED, "AUTORIDAD: CNBV"), Some("CNBV"));
    }

    #[test]
    fn test_acronym_needs_word_boundary() {
        assert_eq!(capture(&AUTORIDAD_ACRONYM, "REQUERIMIENTO DEL SAT."), Some("SAT"));
        assert_eq!(capture(&AUTORIDAD_ACRONYM, "SATISFACTORIO"), None);
    }

    #[test]
    fn test_case_numbers() {
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE: ABC-123"), Some("ABC-123"));
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE NO. 45/2024"), Some("45/2024"));
        assert_eq!(
            capture(&OFICIO_LABELED, "OFICIO NÚM. 214-1-1234/2024"),
            Some("214-1-1234/2024")
        );
        assert_eq!(capture(&OFICIO_LABELED, "OFICIO: SIN NUMERO"), None);
    }

    #[test]
    fn test_number_prefix_variants() {
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE NUM. 45/2024"), Some("45/2024"));
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE NÚMERO 45/2024"), Some("45/2024"));
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE NÚMERO: 45/2024"), Some("45/2024"));
        assert_eq!(capture(&EXPEDIENTE_LABELED, "EXPEDIENTE EN TRAMITE"), None);
        assert_eq!(capture(&OFICIO_LABELED, "OFICIO NUM. 123"), Some("123"));
        assert_eq!(capture(&OFICIO_LABELED, "OFICIO NUMERO: 214-1-99/2024"), Some("214-1-99/2024"));
    }

    #[test]
    fn test_labeled_values_stop_at_multi_word_labels() {
        let text = "AUTORIDAD EMISORA: SAT TIPO DE REQUERIMIENTO: EMBARGO AUTORIDAD EMISORA: CNBV";
        assert_eq!(capture(&AUTORIDAD_LABELED, text), Some("SAT"));
        assert_eq!(capture(&TIPO_LABELED, text), Some("EMBARGO"));
        assert_eq!(
            capture(&TIPO_LABELED, "TIPO: ASEGURAMIENTO DE CUENTAS NÚMERO DE OFICIO: 12/2024"),
            Some("ASEGURAMIENTO DE CUENTAS")
        );
    }

    #[test]
    fn test_rfc() {
        assert_eq!(capture(&RFC_LABELED, "R.F.C.: GODE561231GR8"), Some("GODE561231GR8"));
        assert_eq!(capture(&RFC_STANDALONE, "CONTRIBUYENTE ABC010203XY1 ACTIVO"), Some("ABC010203XY1"));
    }
}
