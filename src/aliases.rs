//! Declarative alias tables for source column names.
//!
//! The three sources name the same quantity differently ("Gls/90", "Goals per
//! 90", "Goles/90"). Instead of probing alternate spellings in code, every
//! known spelling is listed once here and resolved through a single lookup on
//! a normalized key.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::dataset::Row;

/// `(canonical metric, known source spellings)`.
pub const METRIC_ALIASES: &[(&str, &[&str])] = &[
    ("Goals_90", &["Goals/90", "Gls/90", "Goals per 90", "goals_per_90", "Goles/90", "npG/90"]),
    ("Assists_90", &["Assists/90", "Ast/90", "Assists per 90", "assists_per_90", "Asistencias/90"]),
    ("xG_90", &["xG/90", "Expected Goals/90", "xg_per_90", "npxG/90"]),
    ("xA_90", &["xA/90", "xAG/90", "Expected Assists/90", "xa_per_90"]),
    ("Shots_90", &["Shots/90", "Sh/90", "Shots per 90", "Tiros/90"]),
    ("Shots_On_Target_90", &["SoT/90", "Shots on Target/90", "Shots On Target per 90"]),
    ("Key_Passes_90", &["Key Passes/90", "KP/90", "Key passes per 90", "Pases clave/90"]),
    ("Progressive_Passes_90", &["PrgP/90", "Progressive Passes/90", "Prog Passes/90"]),
    ("Progressive_Carries_90", &["PrgC/90", "Progressive Carries/90", "Prog Carries/90"]),
    ("Passes_Completed_90", &["Cmp/90", "Passes Completed/90", "Passes/90", "Pases/90"]),
    ("Pass_Completion_Pct", &["Cmp%", "Pass Completion %", "Pass%", "Pass Accuracy %", "Precisión de pase %"]),
    ("Long_Pass_Pct", &["Long Cmp%", "Long Pass %", "Long Ball Accuracy %"]),
    ("Dribbles_90", &["Succ/90", "Dribbles/90", "Successful Dribbles/90", "Regates/90"]),
    ("Dribble_Success_Pct", &["Succ%", "Dribble Success %", "Take-On Success %"]),
    ("Crosses_90", &["Crs/90", "Crosses/90", "Centros/90"]),
    ("Tackles_90", &["Tkl/90", "Tackles/90", "TklW/90", "Entradas/90"]),
    ("Interceptions_90", &["Int/90", "Interceptions/90", "Intercepciones/90"]),
    ("Blocks_90", &["Blocks/90", "Blk/90"]),
    ("Clearances_90", &["Clr/90", "Clearances/90", "Despejes/90"]),
    ("Aerial_Win_Pct", &["Won%", "Aerial Win %", "Aerials Won %", "Aerial Duels Won %"]),
    ("Duels_Won_Pct", &["Duels Won %", "Duel Win %", "Duelos ganados %"]),
    ("Recoveries_90", &["Recov/90", "Recoveries/90", "Ball Recoveries/90", "Recuperaciones/90"]),
    ("Pressures_90", &["Press/90", "Pressures/90"]),
    ("Touches_In_Box_90", &["Att Pen/90", "Touches in Box/90", "Touches Att Pen/90"]),
    ("Saves_90", &["Saves/90", "Paradas/90"]),
    ("Save_Pct", &["Save%", "Save %", "Save Percentage", "Paradas %"]),
    ("Clean_Sheet_Pct", &["CS%", "Clean Sheet %", "Clean Sheets %"]),
    ("Sweeper_Actions_90", &["#OPA/90", "Sweeper Actions/90", "Def Actions Outside Pen/90"]),
];

/// Consolidated record fields that sources supply under varying headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Season,
    Age,
    Position,
    Profile,
    Club,
    League,
    Minutes,
    MarketValue,
    Salary,
    ContractEnd,
    ReleaseClause,
    ReleaseClauseValue,
    Height,
    Foot,
    ExternalRating,
}

pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Name, &["name", "player", "player_name", "jugador", "nombre", "full_name"]),
    (Field::Season, &["season", "season_tag", "temporada", "campaign"]),
    (Field::Age, &["age", "edad"]),
    (Field::Position, &["position", "pos", "posicion", "posición", "main_position"]),
    (Field::Profile, &["profile", "role", "perfil", "rol"]),
    (Field::Club, &["club", "team", "squad", "equipo"]),
    (Field::League, &["league", "competition", "comp", "liga"]),
    (Field::Minutes, &["minutes", "min", "mins", "minutes_played", "minutos"]),
    (Field::MarketValue, &["market_value", "value", "mv", "valor", "valor_de_mercado"]),
    (Field::Salary, &["salary", "annual_salary", "gross_annual", "salario", "salario_anual", "sueldo"]),
    (Field::ContractEnd, &["contract_end", "contract_expires", "contract", "expires", "fin_contrato", "contrato_hasta"]),
    (Field::ReleaseClause, &["release_clause", "has_release_clause", "clausula", "cláusula", "clause"]),
    (Field::ReleaseClauseValue, &["release_clause_value", "clause_value", "valor_clausula", "valor_cláusula"]),
    (Field::Height, &["height", "height_cm", "altura"]),
    (Field::Foot, &["foot", "preferred_foot", "pie"]),
    (Field::ExternalRating, &["rating", "overall", "ovr", "valoracion", "valoración"]),
];

/// Lower-case, `%` spelled as `pct`, everything else non-alphanumeric dropped.
pub fn alias_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch == '%' {
            out.push_str("pct");
        } else if ch.is_alphanumeric() {
            out.push(ch);
        }
    }
    out
}

static METRIC_INDEX: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (canonical, aliases) in METRIC_ALIASES {
        index.insert(alias_key(canonical), *canonical);
        for alias in *aliases {
            index.entry(alias_key(alias)).or_insert(*canonical);
        }
    }
    index
});

static FIELD_INDEX: Lazy<HashMap<String, Field>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (field, aliases) in FIELD_ALIASES {
        for alias in *aliases {
            index.entry(alias_key(alias)).or_insert(*field);
        }
    }
    index
});

/// Canonical metric name for a known spelling.
pub fn canonical_metric(raw: &str) -> Option<&'static str> {
    METRIC_INDEX.get(&alias_key(raw)).copied()
}

/// Canonical name when known, the trimmed source name otherwise.
pub fn metric_name(raw: &str) -> String {
    canonical_metric(raw)
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_string())
}

pub fn field_for_column(column: &str) -> Option<Field> {
    FIELD_INDEX.get(&alias_key(column)).copied()
}

/// First non-empty cell in `row` whose column resolves to `field`, as text.
pub fn field_text(row: &Row, field: Field) -> Option<String> {
    row.iter()
        .filter(|(column, _)| field_for_column(column) == Some(field))
        .find_map(|(_, cell)| cell.as_text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn field_number(row: &Row, field: Field) -> Option<f64> {
    row.iter()
        .filter(|(column, _)| field_for_column(column) == Some(field))
        .find_map(|(_, cell)| cell.as_number().or_else(|| cell.as_text().and_then(|s| parse_number(&s))))
}

/// True for per-90 rate columns, which get a small floor instead of zero
/// when missing.
pub fn is_per90(metric: &str) -> bool {
    let lower = metric.to_ascii_lowercase();
    lower.ends_with("_90") || lower.ends_with("/90") || lower.contains("per90") || lower.contains("per 90")
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// Parses numbers carrying decorations, thousands separators or a decimal
/// comma: `"2,345"` -> 2345, `"45,5"` -> 45.5, `"1.234.567"` -> 1234567.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == ',')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',').to_string();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) | (0, 1) => cleaned,
        (0, _) => cleaned.replace('.', ""),
        (1, 0) => {
            let decimals = cleaned.rsplit(',').next().map(str::len).unwrap_or(0);
            if decimals == 3 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (_, 0) => cleaned.replace(',', ""),
        _ => {
            // Both present: whichever comes last is the decimal separator.
            let last_comma = cleaned.rfind(',').unwrap_or(0);
            let last_dot = cleaned.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `"750.000"`, `"1.250.000"`: digit groups of three after a leading group
/// that does not start with zero. Read as a decimal this loses a factor of
/// 1000 or more, so the raw text is kept until a field parser decides.
pub fn is_dotted_thousands(raw: &str) -> bool {
    let mut groups = raw.trim().split('.');
    let Some(lead) = groups.next() else {
        return false;
    };
    let lead_ok = (1..=3).contains(&lead.len())
        && lead.chars().all(|c| c.is_ascii_digit())
        && !lead.starts_with('0');
    let mut rest = groups.peekable();
    lead_ok
        && rest.peek().is_some()
        && rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Market values in millions of euros: `"€45.5m"`, `"500k"`, `"45,5 mill."`,
/// `"€1.20bn"`. Bare numbers above 10,000 are taken as euros.
pub fn parse_market_value(raw: &str) -> Option<f64> {
    let lower = raw.trim().to_lowercase();
    let value = parse_number(&lower)?;
    let millions = if lower.contains("bn") {
        value * 1000.0
    } else if lower.contains("mill") {
        value
    } else if lower.contains("mil") {
        value / 1000.0
    } else if lower.contains('m') {
        value
    } else if lower.contains('k') || lower.contains("th") {
        value / 1000.0
    } else if value > 10_000.0 {
        value / 1_000_000.0
    } else {
        value
    };
    Some(millions).filter(|v| *v >= 0.0)
}

/// Amounts in euros: `"€1,200,000"`, `"750.000"`, `"1.2M"`, `"850k"`,
/// `"2,5 mill."`, `"500 mil €"`. A single dot before exactly three digits is
/// a thousands separator here, never a decimal point.
pub fn parse_money(raw: &str) -> Option<f64> {
    let lower = raw.trim().to_lowercase();
    let digits: String = lower
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let value = if is_dotted_thousands(&digits) {
        digits.replace('.', "").parse::<f64>().ok()?
    } else {
        parse_number(&lower)?
    };
    let euros = if lower.contains("bn") {
        value * 1_000_000_000.0
    } else if lower.contains("mill") {
        value * 1_000_000.0
    } else if lower.contains("mil") {
        value * 1_000.0
    } else if lower.contains('m') {
        value * 1_000_000.0
    } else if lower.contains('k') {
        value * 1_000.0
    } else {
        value
    };
    Some(euros).filter(|v| *v >= 0.0)
}

/// Last four-digit year in the text: `"30/06/2027"`, `"Jun 30, 2027"`.
pub fn parse_year(raw: &str) -> Option<i32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|g| g.len() == 4)
        .filter_map(|g| g.parse::<i32>().ok())
        .filter(|y| (1900..=2100).contains(y))
        .last()
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "y" | "sí" | "si" | "s" | "true" | "1" | "x" => Some(true),
        "no" | "n" | "false" | "0" | "" | "-" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_aliases_resolve_to_canonical() {
        assert_eq!(canonical_metric("Gls/90"), Some("Goals_90"));
        assert_eq!(canonical_metric(" goals per 90 "), Some("Goals_90"));
        assert_eq!(canonical_metric("Cmp%"), Some("Pass_Completion_Pct"));
        assert_eq!(canonical_metric("Pass_Completion_Pct"), Some("Pass_Completion_Pct"));
        assert_eq!(canonical_metric("Custom Stat"), None);
        assert_eq!(metric_name(" Custom Stat "), "Custom Stat");
    }

    #[test]
    fn every_alias_is_unambiguous() {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for (canonical, aliases) in METRIC_ALIASES {
            for alias in aliases.iter().chain(std::iter::once(canonical)) {
                if let Some(prev) = seen.insert(alias_key(alias), canonical) {
                    assert_eq!(prev, *canonical, "alias {alias} maps twice");
                }
            }
        }
    }

    #[test]
    fn field_columns_resolve() {
        assert_eq!(field_for_column("Jugador"), Some(Field::Name));
        assert_eq!(field_for_column("Market Value"), Some(Field::MarketValue));
        assert_eq!(field_for_column("Cláusula"), Some(Field::ReleaseClause));
        assert_eq!(field_for_column("Gls/90"), None);
    }

    #[test]
    fn parse_number_handles_separators() {
        assert_eq!(parse_number("2,345"), Some(2345.0));
        assert_eq!(parse_number("45,5"), Some(45.5));
        assert_eq!(parse_number("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_number("1.234,5"), Some(1234.5));
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn parse_market_value_units() {
        assert_eq!(parse_market_value("€45.5m"), Some(45.5));
        assert_eq!(parse_market_value("500k"), Some(0.5));
        assert_eq!(parse_market_value("45,5 mill."), Some(45.5));
        assert!((parse_market_value("€1.20bn").unwrap() - 1200.0).abs() < 1e-9);
        assert_eq!(parse_market_value("800 mil €"), Some(0.8));
        assert_eq!(parse_market_value("25000000"), Some(25.0));
        assert_eq!(parse_market_value("12"), Some(12.0));
    }

    #[test]
    fn dotted_thousands_shape() {
        assert!(is_dotted_thousands("750.000"));
        assert!(is_dotted_thousands("1.250.000"));
        assert!(!is_dotted_thousands("0.125"));
        assert!(!is_dotted_thousands("1.25"));
        assert!(!is_dotted_thousands("7500"));
        assert!(!is_dotted_thousands("1234.000"));
    }

    #[test]
    fn parse_money_and_year_and_flag() {
        assert_eq!(parse_money("€1,200,000"), Some(1_200_000.0));
        assert!((parse_money("1.2M").unwrap() - 1_200_000.0).abs() < 1e-6);
        assert_eq!(parse_money("750.000"), Some(750_000.0));
        assert_eq!(parse_money("1.250.000 €"), Some(1_250_000.0));
        assert_eq!(parse_money("500 mil €"), Some(500_000.0));
        assert_eq!(parse_money("2,5 mill."), Some(2_500_000.0));
        assert_eq!(parse_money("850k"), Some(850_000.0));
        assert_eq!(parse_year("30/06/2027"), Some(2027));
        assert_eq!(parse_year("Jun 30, 2027"), Some(2027));
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_flag("Sí"), Some(true));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
