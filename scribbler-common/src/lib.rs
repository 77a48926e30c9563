pub mod form;
pub mod model;
pub mod paginator;
pub mod snowflake;
