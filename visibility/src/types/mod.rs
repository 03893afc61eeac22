pub mod attribute;
pub mod record;
pub mod sort;
pub mod value;

pub use attribute::{Attribute, AttributeType};
pub use record::ExecutionRecord;
pub use sort::{SortDirection, SortKey, SortSpec};
pub use value::AttributeValue;
