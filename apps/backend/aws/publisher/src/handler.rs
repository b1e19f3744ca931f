use lambda_http::{Body, Error, Request, Response, tracing};
use serde_json::{Value, json};
use webhook_relay::{QueuePublisher, parse_publish_request};

pub async fn handle(
    publisher: &dyn QueuePublisher,
    request: Request,
) -> Result<Response<Body>, Error> {
    // Only an absent body is missing; an empty one is invalid JSON
    let body = match request.body() {
        Body::Empty => None,
        body => Some(body.as_ref()),
    };

    let result = match parse_publish_request(body) {
        Ok(envelope) => publisher.publish(&envelope).await.map(|id| (envelope, id)),
        Err(err) => Err(err),
    };

    match result {
        Ok((envelope, id)) => {
            tracing::info!(message_id = %id, webhook_key = %envelope.webhook_key, "Message queued");
            json_response(200, json!({ "message": "queued", "id": id }))
        }
        Err(err) if err.is_client_error() => {
            tracing::warn!(error = %err, "Rejected publish request");
            json_response(400, json!({ "message": err.to_string() }))
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to enqueue message");
            json_response(500, json!({ "message": "internal error" }))
        }
    }
}

fn json_response(status: u16, body: Value) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?)
}
