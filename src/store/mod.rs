// Persistence collaborator for sessions and shared aggregates.
//
// Every record is versioned; writers read, mutate a copy and compare-and-swap it back.
// `KeyedLocks` serializes writers to one key inside this process so the CAS only
// loses against writers elsewhere.

// Public API - what other modules can use
pub use locks::{KeyGuard, KeyedLocks};
pub use memory::InMemoryVersionedRepository;
pub use postgres::PostgresVersionedRepository;
pub use versioned::{update_with_retry, CasOutcome, Versioned, VersionedRepository};

// Internal modules
mod locks;
mod memory;
mod postgres;
mod versioned;
