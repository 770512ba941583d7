pub mod batch;
pub mod feedback;
pub mod ingest;
pub mod providers;
pub mod recommendations;
pub mod similarity;
pub mod similarity_store;
