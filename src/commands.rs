//! Typed calls into the host's command channel.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::trace;

use crate::{
    error::GatewayError,
    structs::{
        daily_volume::DailyVolumeMap,
        drink_point::{DrinkHistory, DrinkPoint},
    },
};

pub const LIST_DRINKS: &str = "list_drinks";
pub const LIST_DRINKS_GROUP_DAY: &str = "list_drinks_group_day";
pub const GET_LATEST_DRINK: &str = "get_latest_drink";
pub const CAN_SEND_NOTIFICATION: &str = "can_send_notification";
pub const CREATE_DRINK_NOTIFICATION: &str = "create_drink_notification";
pub const START_OAUTH_AUTHENTICATION: &str = "start_oauth_authentication";
pub const GREET: &str = "greet";

/// Request/response bridge to the host application.
#[async_trait]
pub trait CommandGateway: Send + Sync + 'static {
    /// Invokes `command` with JSON `args` and returns the raw JSON response.
    async fn invoke(&self, command: &'static str, args: Value) -> Result<Value, GatewayError>;
}

async fn invoke_as<T: DeserializeOwned>(
    gateway: &dyn CommandGateway,
    command: &'static str,
    args: Value,
) -> Result<T, GatewayError> {
    trace!("[{command}] Requesting data from host");

    let response = gateway.invoke(command, args).await?;
    serde_json::from_value(response).map_err(|source| GatewayError::Decode { command, source })
}

pub async fn list_drinks(gateway: &dyn CommandGateway) -> Result<DrinkHistory, GatewayError> {
    invoke_as(gateway, LIST_DRINKS, Value::Null).await
}

pub async fn list_drinks_group_day(
    gateway: &dyn CommandGateway,
) -> Result<DailyVolumeMap, GatewayError> {
    invoke_as(gateway, LIST_DRINKS_GROUP_DAY, Value::Null).await
}

pub async fn get_latest_drink(
    gateway: &dyn CommandGateway,
) -> Result<Option<DrinkPoint>, GatewayError> {
    invoke_as(gateway, GET_LATEST_DRINK, Value::Null).await
}

pub async fn can_send_notification(gateway: &dyn CommandGateway) -> Result<bool, GatewayError> {
    invoke_as(gateway, CAN_SEND_NOTIFICATION, Value::Null).await
}

/// Asks the host to show a native "time to drink" notification.
pub async fn create_drink_notification(gateway: &dyn CommandGateway) -> Result<(), GatewayError> {
    gateway
        .invoke(CREATE_DRINK_NOTIFICATION, Value::Null)
        .await
        .map(drop)
}

/// Asks the host to launch the Google OAuth consent flow.
pub async fn start_oauth_authentication(gateway: &dyn CommandGateway) -> Result<(), GatewayError> {
    gateway
        .invoke(START_OAUTH_AUTHENTICATION, Value::Null)
        .await
        .map(drop)
}

pub async fn greet(gateway: &dyn CommandGateway, name: &str) -> Result<String, GatewayError> {
    invoke_as(gateway, GREET, json!({ "name": name })).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, Value)>>,
    }

    #[async_trait]
    impl CommandGateway for Recorder {
        async fn invoke(&self, command: &'static str, args: Value) -> Result<Value, GatewayError> {
            self.calls.lock().unwrap().push((command, args.clone()));

            match command {
                GREET => Ok(json!(format!("Hello, {}!", args["name"].as_str().unwrap()))),
                GET_LATEST_DRINK => Ok(json!({ "timestamp": 10, "amount": 200.0 })),
                LIST_DRINKS => Ok(json!("not a list")),
                _ => Ok(Value::Null),
            }
        }
    }

    #[tokio::test]
    async fn greet_sends_name_argument() {
        let gateway = Recorder::default();

        let message = greet(&gateway, "Angelo").await.unwrap();

        assert_eq!(message, "Hello, Angelo!");
        assert_eq!(
            gateway.calls.lock().unwrap()[0],
            (GREET, json!({ "name": "Angelo" }))
        );
    }

    #[tokio::test]
    async fn decodes_latest_drink() {
        let latest = get_latest_drink(&Recorder::default()).await.unwrap();
        assert_eq!(latest, Some(DrinkPoint::new(10, 200.0)));
    }

    #[tokio::test]
    async fn malformed_response_is_a_decode_error() {
        let err = list_drinks(&Recorder::default()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode { command: LIST_DRINKS, .. }));
    }
}
