//! Reward tables, one per decision axis.
//!
//! A missing response (transport failure) is always the worst outcome.
//! Status-specific rows (401, 405) are checked before their class rows.
//! The constants are a fixed contract; do not re-derive them.

use crate::transport::ApiResponse;

const NO_RESPONSE: f64 = -10.0;

/// Header/credential axis.
pub fn header_reward(response: Option<&ApiResponse>) -> f64 {
    let Some(response) = response else {
        return NO_RESPONSE;
    };
    let status = response.status_code;
    match status {
        401 => -3.0,
        _ if status / 100 == 4 => -1.0,
        _ if status / 100 == 5 => -1.0,
        _ if status / 100 == 2 => 2.0,
        _ => -3.0,
    }
}

/// Value-synthesis axis.
pub fn value_reward(response: Option<&ApiResponse>) -> f64 {
    let Some(response) = response else {
        return NO_RESPONSE;
    };
    let status = response.status_code;
    match status {
        _ if status / 100 == 2 => 2.0,
        405 => -5.0,
        _ if status / 100 == 4 => -2.0,
        _ if status / 100 == 5 => -1.0,
        _ => -5.0,
    }
}

/// Parameter-selection axis.
pub fn parameter_reward(response: Option<&ApiResponse>) -> f64 {
    let Some(response) = response else {
        return NO_RESPONSE;
    };
    let status = response.status_code;
    match status {
        _ if status / 100 == 2 => 2.0,
        405 => -5.0,
        _ if status / 100 == 4 => -2.0,
        _ if status / 100 == 5 => -1.0,
        _ => -5.0,
    }
}

/// Success-seeking axes: data source, body object, dependency binding.
pub fn good_response_reward(response: Option<&ApiResponse>) -> f64 {
    let Some(response) = response else {
        return NO_RESPONSE;
    };
    let status = response.status_code;
    match status {
        _ if status / 100 == 2 => 2.0,
        405 => -3.0,
        _ if status / 100 == 4 => -1.0,
        _ if status / 100 == 5 => -1.0,
        _ => -5.0,
    }
}

/// Fault-seeking operation axis: server errors are the target signal, plain
/// successes are uninteresting, and 405 means the request was structurally
/// wrong.
pub fn bad_response_reward(response: Option<&ApiResponse>) -> f64 {
    let Some(response) = response else {
        return NO_RESPONSE;
    };
    let status = response.status_code;
    match status {
        405 => -10.0,
        401 => -3.0,
        _ if status / 100 == 4 => 1.0,
        _ if status / 100 == 5 => 2.0,
        _ if status / 100 == 2 => -1.0,
        _ => -5.0,
    }
}
