pub mod registry;
pub mod schema;
pub mod tracking;

pub use registry::{MigrationRecord, Registry};
pub use schema::create_table;
pub use tracking::{Field, TrackingModel};
