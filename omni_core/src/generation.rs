//! Generation client: prompt construction and response validation.

use crate::document::SceneDocument;
use crate::error::GenerationError;

use omni_env::{ContentGenerator, EnvError, GenerationMode, GenerationRequest, GeneratorCall};
use tracing::{info, warn};

/// Sampling temperature for scene generation.
pub const GENERATION_TEMPERATURE: f32 = 0.4;

pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// Fixed instruction sent with every generation request.
pub const SYSTEM_INSTRUCTION: &str = r#"You are the Omni-Engine, a generator of narrated, educational 3D science simulations.

INPUT: a JSON object { "user_query": string, "mode": "STANDARD" | "WHAT_IF_REMIX" }.

OUTPUT: one raw JSON object and nothing else, with these keys:
{
  "meta_data": { "title": string, "scientific_verdict": string, "is_remix": boolean },
  "visual_settings": {
    "environment_preset": "studio" | "sun" | "lab" | "night" | "volcano_gloom",
    "post_processing": { "bloom_intensity": number 0-3, "vignette": boolean }
  },
  "lab_assistant_config": {
    "bot_name": string,
    "context_brief": string (the science of this scene, for the chat assistant),
    "suggested_questions": [string]
  },
  "stage_assets": [{
    "id": unique string,
    "type": "sphere" | "cube" | "cylinder" | "cone" | "terrain_model" | "glb_asset",
    "initial_transform": { "position": [x,y,z], "rotation": [x,y,z], "scale": [x,y,z] },
    "pbr_material": {
      "material_class": "GLASS" | "LIQUID" | "METAL" | "PLASTIC" | "ROCK" | "GLOWING_LAVA",
      "base_color": hex string, "roughness": 0-1, "metalness": 0-1,
      "transmission": 0-1, "emissive_intensity": number >= 0
    }
  }],
  "vfx_stack": [{
    "id": string, "effect_type": "FIRE" | "SMOKE" | "SPARKS" | "CLOUDS" | "FOG",
    "parent_actor_id": optional actor id,
    "config": { "color": hex string, "count": 50-1000, "speed": 0.1-5, "scale": 1-10, "opacity": 0.1-1 },
    "position_offset": [x,y,z]
  }],
  "ui_overlays": [{ "target_actor_id": actor id, "label_text": short string, "screen_offset": [x,y] }],
  "sync_timeline": [{
    "step_id": integer, "duration_seconds": number > 0,
    "ui_display": { "chapter_title": string, "sidebar_explanation": string, "chatbot_update": string },
    "visual_events": {
      "camera_focus_target": actor id,
      "actions": [{
        "actor_id": actor id,
        "type": "MOVE_TO" | "SCALE_TO" | "ROTATE_TO" | "FADE_OUT",
        "target_value": [x,y,z] (omit for FADE_OUT),
        "easing": "bounce_out" | "ease_in_out" | "linear"
      }]
    }
  }]
}

RULES:
1. Output raw JSON only, without markdown fences or commentary.
2. No physics engine exists. Animate falls explicitly with MOVE_TO to y=0 and bounce_out easing, and state start and end positions so nothing sinks below the floor.
3. Use only the five listed effect types. Never invent new ones.
4. Materials: glass is GLASS with transmission 1.0 and roughness 0.05; lava is GLOWING_LAVA with emissive_intensity 5.0 plus a FIRE emitter; metal is METAL with metalness 1.0.
5. In WHAT_IF_REMIX mode, rebuild stage_assets and sync_timeline around the changed premise (zero gravity floats upward, an ice world turns to GLASS with FOG) and set is_remix to true.
"#;

/// Builds the generator call for a query. Blank queries are rejected.
pub fn build_generator_call(
    query: &str,
    mode: GenerationMode,
) -> Result<GeneratorCall, GenerationError> {
    let user_query = query.trim();
    if user_query.is_empty() {
        return Err(GenerationError::EmptyQuery);
    }

    let request = GenerationRequest {
        user_query: user_query.to_string(),
        mode,
    };
    let payload = serde_json::to_string(&request).map_err(EnvError::from)?;

    Ok(GeneratorCall {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        payload,
        temperature: GENERATION_TEMPERATURE,
        response_mime_type: RESPONSE_MIME_TYPE,
    })
}

/// Validates raw generator output into a document.
pub fn parse_response(text: &str) -> Result<SceneDocument, GenerationError> {
    Ok(SceneDocument::from_json(text)?)
}

/// Runs one generation end to end.
pub async fn generate_document<G>(
    generator: &G,
    call: &GeneratorCall,
) -> Result<SceneDocument, GenerationError>
where
    G: ContentGenerator + ?Sized,
{
    let text = generator.generate(call).await.map_err(|e| {
        warn!(generator = generator.name(), "generation failed: {}", e);
        GenerationError::Service(e)
    })?;

    let document = parse_response(&text).map_err(|e| {
        warn!(generator = generator.name(), "generator returned an invalid document: {}", e);
        e
    })?;

    info!(
        title = %document.meta.title,
        actors = document.actors.len(),
        steps = document.timeline.len(),
        "scene generated"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use async_trait::async_trait;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl ContentGenerator for Fixed {
        async fn generate(&self, call: &GeneratorCall) -> Result<String, EnvError> {
            assert_eq!(call.response_mime_type, "application/json");
            self.0.map(str::to_string).map_err(EnvError::service)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_build_call() {
        let call = build_generator_call("  What if gravity was zero? ", GenerationMode::WhatIfRemix).unwrap();
        assert_eq!(
            call.payload,
            r#"{"user_query":"What if gravity was zero?","mode":"WHAT_IF_REMIX"}"#
        );
        assert_eq!(call.temperature, 0.4);
        assert!(call.system_instruction.contains("WHAT_IF_REMIX"));
    }

    #[test]
    fn test_blank_query_rejected() {
        assert!(matches!(
            build_generator_call(" \n", GenerationMode::Standard),
            Err(GenerationError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_generate_document_outcomes() {
        let call = build_generator_call("volcano", GenerationMode::Standard).unwrap();

        let doc = generate_document(&Fixed(Ok(r#"{"meta_data":{"title":"Volcano"}}"#)), &call)
            .await
            .unwrap();
        assert_eq!(doc.meta.title, "Volcano");

        let err = generate_document(&Fixed(Err("quota")), &call).await.unwrap_err();
        assert!(matches!(err, GenerationError::Service(_)));

        let err = generate_document(&Fixed(Ok("")), &call).await.unwrap_err();
        assert!(matches!(err, GenerationError::Document(DocumentError::Empty)));

        let err = generate_document(&Fixed(Ok("not json")), &call).await.unwrap_err();
        assert!(matches!(err, GenerationError::Document(DocumentError::Malformed(_))));
    }
}
