mod repo;

pub use repo::current_sha;
