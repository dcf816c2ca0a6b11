pub mod containment;

pub use containment::ring_contains;
