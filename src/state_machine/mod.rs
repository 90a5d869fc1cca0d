// Registry state machine
//
// The registry row for each bundled definition moves through `ImportStatus`;
// transition legality is checked by `RegistryEntry` before anything is persisted.

pub mod states;

pub use states::ImportStatus;
