pub mod connection;
pub mod mongo_store;

pub use mongo_store::MongoStore;
