//! Prompt texts for value synthesis.

pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are an assistant generating concrete, context-aware values for REST API testing. \
     Answer with JSON only.";

pub const PARAMETERS_GEN_PROMPT: &str = r#"Given a summary of an operation and its parameter schemas, generate valid context-aware values for the parameters of the operation. Attempt to generate values for all required parameters. Return the answer as a JSON object with the following structure:
{
    "parameters": {
        "[parameter1]": [value1],
        "[parameter2]": [value2]
    }
}
When a parameter is an object, use a JSON object for its value; when it is an array, use a JSON list. Read the associated description, types, and formats of each field to ensure the correct value is generated."#;

pub const REQUEST_BODY_GEN_PROMPT: &str = r#"Given a summary of an operation and its request body schema, generate a valid context-aware request body for the operation. Return the answer as a JSON object with the following structure:
{
    "request_body": [correct request body]
}
When the request body is an object, use a JSON object whose keys are the field names; when it is an array, use a JSON list. Ensure all required fields are present and read each field's description, type, and format to generate a correct value."#;

pub const CREDENTIALS_GEN_PROMPT: &str = r#"Generate plausible username and password pairs for authenticating against a REST API under test. Return the answer as a JSON object with the following structure:
{
    "credentials": [
        {"username": "[username]", "password": "[password]"}
    ]
}"#;

/// Compose the user message for a generation request.
pub fn generation_prompt(summary: &str, schema_json: &str, is_request_body: bool) -> String {
    let prefix = if is_request_body {
        REQUEST_BODY_GEN_PROMPT
    } else {
        PARAMETERS_GEN_PROMPT
    };
    let tail = if is_request_body {
        "REQUEST_BODY: "
    } else {
        "PARAMETERS: "
    };
    format!(
        "{}\nSUMMARY: {}\nSCHEMA: {}\n{}",
        prefix, summary, schema_json, tail
    )
}
