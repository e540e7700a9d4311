//! Store clients for the migration source and target
//!
//! - [`MongoSource`] reads the source collections
//! - [`PostgresStore`] writes the target table
//! - [`Credentials`] carries logins for both

mod auth;
mod mongo;
mod postgres;

pub use auth::Credentials;
pub use mongo::{MongoCursor, MongoSource, bson_to_json};
pub use postgres::PostgresStore;
