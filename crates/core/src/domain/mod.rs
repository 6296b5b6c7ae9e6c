pub mod financial;
pub mod records;
