use serde::{Deserialize, Serialize};

pub type PersonaId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub system_prompt: String,
}

/// Body for creating or updating a persona.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaInput {
    pub name: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
}
