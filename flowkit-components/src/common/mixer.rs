//! Mixer component (latest-value combiner).
//!
//! Mixes the latest values received on its input ports into a single
//! message. The set of inputs is configured through settings; the input
//! ports, the output shape, and the schema `$defs` are all regenerated from
//! that list. This component exercises the dynamic schema-composition path
//! end to end: a plain record type could not.

use flowkit_core::port::SETTINGS_PORT;
use flowkit_core::prelude::*;
use flowkit_core::schema;
use parking_lot::{Mutex, RwLock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Component name.
pub const MIXER_COMPONENT: &str = "mixer";
/// Combined-output port.
pub const MIXER_OUTPUT_PORT: &str = "output";

/// Mixer settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MixerSettings {
    /// Ordered, unique input names; one source port per name.
    #[schemars(title = "Inputs", extend("minItems" = 1, "uniqueItems" = true))]
    pub inputs: Vec<String>,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            inputs: vec!["A".to_string(), "B".to_string()],
        }
    }
}

/// Payload of every input port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MixerInput {
    /// Arbitrary message.
    #[schemars(
        title = "Context",
        description = "Arbitrary message",
        extend("configurable" = true)
    )]
    #[serde(default)]
    pub context: Value,
}

/// The mixer component.
pub struct Mixer {
    settings: RwLock<MixerSettings>,
    /// input name → last context seen on that input
    latest: Mutex<HashMap<String, Value>>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            settings: RwLock::new(MixerSettings::default()),
            latest: Mutex::new(HashMap::new()),
        }
    }
}

fn port_name_from_input(input: &str) -> String {
    input.to_lowercase()
}

fn output_property(input: &str) -> String {
    format!("context{}", input)
}

impl Mixer {
    fn context_definition(input: &str) -> String {
        schema::schema_name(MIXER_COMPONENT, &format!("context{}", input))
    }

    /// Schema document for one input port: the derived input record moved
    /// behind a per-input `$defs` name, its context referencing the
    /// per-input context definition.
    fn input_schema(input: &str) -> Value {
        let root_name = schema::schema_name(MIXER_COMPONENT, &format!("input{}", input));
        let context_name = Self::context_definition(input);

        let mut derived = schema::schema_of::<MixerInput>();
        if let Some(obj) = derived.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        schema::set_attr(
            &mut derived,
            "/properties/context",
            "$ref",
            json!(format!("#/$defs/{}", context_name)),
        );

        let mut doc = json!({ "$ref": format!("#/$defs/{}", root_name) });
        schema::add_definition(&mut doc, &root_name, derived);
        schema::add_definition(&mut doc, &context_name, json!({}));
        schema::set_definition_path(&mut doc, &context_name, "$.context");
        doc
    }

    /// Schema document for the output port: a synthetic record with one
    /// property per configured input, each referencing that input's
    /// context definition.
    fn output_schema(inputs: &[String]) -> Value {
        let output_name = schema::schema_name(MIXER_COMPONENT, "output");

        let mut properties = Map::new();
        for input in inputs {
            properties.insert(
                output_property(input),
                schema::definition_ref(&Self::context_definition(input)),
            );
        }

        let mut doc = json!({ "$ref": format!("#/$defs/{}", output_name) });
        schema::add_definition(
            &mut doc,
            &output_name,
            json!({ "type": "object", "properties": properties }),
        );
        for input in inputs {
            schema::add_definition(&mut doc, &Self::context_definition(input), json!({}));
        }
        doc
    }

    fn output_value(&self, inputs: &[String]) -> Value {
        let latest = self.latest.lock();
        let mut out = Map::new();
        for input in inputs {
            out.insert(
                output_property(input),
                latest.get(input).cloned().unwrap_or(Value::Null),
            );
        }
        Value::Object(out)
    }
}

impl Component for Mixer {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(MIXER_COMPONENT)
            .with_description("Mixer")
            .with_info("Mixes latest values on ports into a single message")
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let settings = self.settings.read().clone();

        let mut ports = vec![Port::settings(&settings)];
        for input in &settings.inputs {
            ports.push(
                Port::source(port_name_from_input(input), input.clone())
                    .with_position(PortPosition::Left)
                    .with_config(&MixerInput::default())
                    .with_schema(Self::input_schema(input)),
            );
        }
        let mut output = Port::sink(MIXER_OUTPUT_PORT, "Output")
            .with_position(PortPosition::Right)
            .with_schema(Self::output_schema(&settings.inputs));
        output.default_value = self.output_value(&settings.inputs);
        ports.push(output);
        ports
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            if port == SETTINGS_PORT {
                let settings: MixerSettings = msg.decode_settings(MIXER_COMPONENT)?;
                // swap the input list first, then drop stale values; lock
                // order matches the input path (settings, then latest)
                *self.settings.write() = settings;
                self.latest.lock().clear();
                return Ok(());
            }

            let inputs = self.settings.read().inputs.clone();
            let Some(input) = inputs
                .iter()
                .find(|name| port_name_from_input(name) == port)
                .cloned()
            else {
                return Err(FlowError::unknown_port(port));
            };

            let received: MixerInput = msg.decode(port)?;
            self.latest.lock().insert(input, received.context);

            let out = self.output_value(&inputs);
            handler(MIXER_OUTPUT_PORT, Message::Value(out)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn collecting_handler() -> (Handler, Arc<parking_lot::Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |port, msg| {
            let sink = sink.clone();
            async move {
                let value = msg.as_value().cloned().unwrap_or(Value::Null);
                sink.lock().push((port, value));
                Ok(())
            }
        });
        (handler, seen)
    }

    async fn apply_inputs(mixer: &Mixer, inputs: &[&str]) {
        let settings = Message::encode(&MixerSettings {
            inputs: inputs.iter().map(|i| (*i).to_string()).collect(),
        })
        .unwrap();
        mixer
            .handle(
                CancellationToken::new(),
                noop_handler(),
                SETTINGS_PORT,
                settings,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn emits_latest_values_per_input() {
        let mixer = Mixer::default();
        let (handler, seen) = collecting_handler();

        let input = Message::encode(&MixerInput {
            context: json!({"from": "a"}),
        })
        .unwrap();
        mixer
            .handle(CancellationToken::new(), handler.clone(), "a", input)
            .await
            .unwrap();

        let input = Message::encode(&MixerInput {
            context: json!({"from": "b"}),
        })
        .unwrap();
        mixer
            .handle(CancellationToken::new(), handler, "b", input)
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, MIXER_OUTPUT_PORT);
        assert_eq!(seen[0].1, json!({"contextA": {"from": "a"}, "contextB": null}));
        assert_eq!(
            seen[1].1,
            json!({"contextA": {"from": "a"}, "contextB": {"from": "b"}})
        );
    }

    #[tokio::test]
    async fn settings_reset_clears_latest_values() {
        let mixer = Mixer::default();
        let (handler, seen) = collecting_handler();

        let input = Message::encode(&MixerInput {
            context: json!("stale"),
        })
        .unwrap();
        mixer
            .handle(CancellationToken::new(), handler.clone(), "a", input)
            .await
            .unwrap();

        apply_inputs(&mixer, &["A", "C"]).await;

        let input = Message::encode(&MixerInput {
            context: json!("fresh"),
        })
        .unwrap();
        mixer
            .handle(CancellationToken::new(), handler, "c", input)
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(
            seen.last().unwrap().1,
            json!({"contextA": null, "contextC": "fresh"})
        );
    }

    #[tokio::test]
    async fn stale_port_is_rejected_after_reconfiguration() {
        let mixer = Mixer::default();
        apply_inputs(&mixer, &["X"]).await;

        let input = Message::encode(&MixerInput::default()).unwrap();
        let err = mixer
            .handle(CancellationToken::new(), noop_handler(), "a", input)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownPort { .. }));
    }

    #[tokio::test]
    async fn output_schema_tracks_configured_inputs() {
        let mixer = Mixer::default();
        apply_inputs(&mixer, &["A", "B", "C"]).await;

        let ports = mixer.ports();
        let names: Vec<_> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![SETTINGS_PORT, "a", "b", "c", MIXER_OUTPUT_PORT]);

        let output = ports.last().unwrap();
        let properties = output
            .schema
            .pointer("/$defs/Mixeroutput/properties")
            .and_then(Value::as_object)
            .unwrap();
        let keys: Vec<_> = properties.keys().cloned().collect();
        assert_eq!(keys, vec!["contextA", "contextB", "contextC"]);
        assert_eq!(
            properties["contextB"]["$ref"],
            "#/$defs/MixercontextB"
        );

        // reconfiguration drops the other definitions
        apply_inputs(&mixer, &["A"]).await;
        let ports = mixer.ports();
        let output = ports.last().unwrap();
        let properties = output
            .schema
            .pointer("/$defs/Mixeroutput/properties")
            .and_then(Value::as_object)
            .unwrap();
        assert_eq!(properties.len(), 1);
        assert!(properties.contains_key("contextA"));
    }

    #[tokio::test]
    async fn input_schema_is_renamed_per_input() {
        let mixer = Mixer::default();
        let ports = mixer.ports();

        let a = &ports[1];
        assert_eq!(a.schema["$ref"], "#/$defs/MixerinputA");
        assert!(a.schema["$defs"]["MixerinputA"].is_object());
        assert_eq!(
            a.schema["$defs"]["MixerinputA"]["properties"]["context"]["$ref"],
            "#/$defs/MixercontextA"
        );
        assert_eq!(a.schema["$defs"]["MixercontextA"]["path"], "$.context");
    }
}
