//! Integration Test Harness
//!
//! In-process fixtures for driving the combat engine:
//! - `CombatTable` - An engine wired to in-memory collaborators and a
//!   scripted random source, answering rolls by hand
//! - `fixtures` - Standard hero, nodes, and monster records
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::{fixtures, CombatTable};
//!
//! #[tokio::test]
//! async fn test_goblin_fight() {
//!     let table = CombatTable::new(vec![fixtures::goblin()], ScriptedRandom::faces(&[(2, 20)]));
//!     table.start(&fixtures::node(&["goblin"])).await.unwrap();
//!     assert!(table.answer(18, Some(18)).await);
//! }
//! ```

pub mod fixtures;
mod table;

pub use table::{member_ids, CombatTable};
