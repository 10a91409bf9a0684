use models::{Record, TextField};

/// Fields a search term is matched against.
pub const SEARCH_FIELDS: [TextField; 7] = [
    TextField::CustomerName,
    TextField::BikeNumber,
    TextField::MobileNumber,
    TextField::FatherName,
    TextField::EngineNumber,
    TextField::ChassisNumber,
    TextField::PermanentAddress,
];

/// Case-insensitive substring match; `term_lower` must already be lower-cased.
pub fn matches(record: &Record, term_lower: &str) -> bool {
    SEARCH_FIELDS.iter().any(|field| {
        record
            .fields
            .text(*field)
            .map(|value| value.to_lowercase().contains(term_lower))
            .unwrap_or(false)
    })
}

/// Filter preserving collection order. An empty term keeps everything; other
/// terms are matched as typed, surrounding whitespace included.
pub fn filter(records: &[Record], term: &str) -> Vec<Record> {
    let term = term.to_lowercase();
    if term.is_empty() {
        return records.to_vec();
    }
    records.iter().filter(|r| matches(r, &term)).cloned().collect()
}
