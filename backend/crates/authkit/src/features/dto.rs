//! Request and response bodies of the feature routes

use serde::{Deserialize, Serialize};

// ============================================================================
// Signup
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of the resend-verification and forgot-password requests
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// User name or email
    pub login: String,
    pub password: String,
}

// ============================================================================
// Forgot Password
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

// ============================================================================
// Delete Account
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteAccountRequest {
    pub name: String,
    /// Must equal the configured confirmation phrase
    pub phrase: String,
    pub password: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
