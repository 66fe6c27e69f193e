use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::error::SdkError;
use aws_sdk_bedrockruntime::operation::converse::ConverseError;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message, SystemContentBlock,
};
use tracing::debug;

use crate::error::BedrockError;

/// Single-turn Converse call. Returns the concatenated text blocks of the reply.
pub async fn invoke_converse(
    client: &Client,
    model_id: &str,
    system_prompt: &str,
    user_message: &str,
    inference: InferenceConfiguration,
) -> Result<String, BedrockError> {
    let response = client
        .converse()
        .model_id(model_id)
        .system(SystemContentBlock::Text(system_prompt.to_string()))
        .messages(
            Message::builder()
                .role(ConversationRole::User)
                .content(ContentBlock::Text(user_message.to_string()))
                .build()
                .map_err(|e| BedrockError::Invocation(e.to_string()))?,
        )
        .inference_config(inference)
        .send()
        .await
        .map_err(classify_sdk_error)?;

    if let Some(usage) = response.usage() {
        debug!(
            model_id,
            input_tokens = usage.input_tokens(),
            output_tokens = usage.output_tokens(),
            "converse complete"
        );
    }

    let output_message = response
        .output()
        .and_then(|o| o.as_message().ok())
        .ok_or_else(|| BedrockError::ResponseParse("no message in response".to_string()))?;

    let response_text = output_message
        .content()
        .iter()
        .filter_map(|block| {
            if let ContentBlock::Text(text) = block {
                Some(text.as_str())
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("");

    Ok(response_text)
}

fn classify_sdk_error<R>(err: SdkError<ConverseError, R>) -> BedrockError
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err {
        // Never reached Bedrock, or the reply was cut off in transit.
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            BedrockError::Invocation(format!("Converse: {err}"))
        }
        SdkError::ConstructionFailure(_) => BedrockError::Rejected(format!("Converse: {err}")),
        other => classify_service_error(other.into_service_error()),
    }
}

/// Throttling, capacity, and server faults are transient. Everything else
/// (validation, access, unknown model, model errors) fails the same way on
/// every attempt.
pub fn classify_service_error(err: ConverseError) -> BedrockError {
    let transient = err.is_throttling_exception()
        || err.is_service_unavailable_exception()
        || err.is_internal_server_exception()
        || err.is_model_not_ready_exception()
        || err.is_model_timeout_exception();
    if transient {
        BedrockError::Invocation(err.to_string())
    } else {
        BedrockError::Rejected(err.to_string())
    }
}
