//! Listing records produced on the final pass.

/// One listing entry: the address the line assembled at (if any), the
/// bytes it produced, and the original source text.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingLine {
    pub address: Option<u16>,
    pub bytes: Vec<u8>,
    pub source: String,
}

pub type Listing = Vec<ListingLine>;
