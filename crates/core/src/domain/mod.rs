pub mod compare;
pub mod kpi;
pub mod price;
pub mod signal;
