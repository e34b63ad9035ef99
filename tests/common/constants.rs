//! Shared constants for end-to-end tests

// ============================================================================
// Test Principals
// ============================================================================

pub const ALICE_LOGIN: &str = "alice1";
pub const ALICE_PASS: &str = "secret1";
pub const ALICE_EMAIL: &str = "alice@example.com";

pub const BOB_LOGIN: &str = "bob22";
pub const BOB_PASS: &str = "secret2";
pub const BOB_EMAIL: &str = "bob@example.com";

/// Promoted to admin directly through the store after registration.
pub const ROOT_LOGIN: &str = "rootadm";
pub const ROOT_PASS: &str = "rootpass";
pub const ROOT_EMAIL: &str = "root@example.com";

// ============================================================================
// Test Timeouts
// ============================================================================

/// Maximum time to wait for the server to answer its health check
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Per-request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Store timeout of the test server, generous because Argon2 is slow in
/// unoptimized builds
pub const STORE_TIMEOUT_SECS: u64 = 30;

/// Secret the test server signs session tokens with
pub const TEST_JWT_SECRET: &str = "e2e-test-secret-0123456789abcdef";
