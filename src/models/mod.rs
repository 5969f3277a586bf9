use uuid::Uuid;

pub mod product;

pub use product::*;

// Helper function to generate record identifiers in the format stored in the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
