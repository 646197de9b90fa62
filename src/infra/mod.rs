// ============================================================
// Infrastructure Layer
// ============================================================
// Disk persistence for heads:
//
//   head_store.rs - weights (burn recorder) and JSON config,
//                   one pair of files per head index
//
// Reference: Burn Book §5 (Checkpointing)

pub mod head_store;
