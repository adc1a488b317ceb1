mod cleanup;

pub use cleanup::RunCleanupTask;
