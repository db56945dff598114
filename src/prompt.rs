//! Prompt construction.
//!
//! Prompts are plain text made of delimited sections: optional general
//! instructions from the project's instructions file, the current request,
//! and closing task guidance. File content is not embedded here; it travels
//! as labeled context blobs through the generation client.

use crate::sandbox::PathSandbox;
use crate::session::{Speaker, Turn};

/// Guidance appended to every file-producing prompt.
pub const RAW_OUTPUT_GUIDANCE: &str = "Output only the raw file content or response, without any extra explanations, introductions, or markdown formatting like ``` unless it's part of the actual file content.";

/// Reads the project's general-instructions file, if present and readable.
///
/// The file is resolved inside the sandbox; a name or symlink leading
/// outside the root is ignored.
pub fn load_general_instructions(sandbox: &PathSandbox, file_name: &str) -> Option<String> {
    let path = match sandbox.resolve(file_name) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "instructions path rejected, continuing without it");
            return None;
        }
    };
    if !path.is_file() {
        return None;
    }

    match std::fs::read_to_string(&path) {
        Ok(content) if content.trim().is_empty() => None,
        Ok(content) => {
            tracing::debug!(path = ?path, "loaded general instructions");
            Some(content)
        }
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "could not read instructions file, continuing without it");
            None
        }
    }
}

fn push_general(lines: &mut Vec<String>, general: Option<&str>) {
    if let Some(general) = general {
        lines.push("--- General Instructions ---".to_string());
        lines.push(general.to_string());
        lines.push("--- End General Instructions ---\n".to_string());
    }
}

fn push_request(lines: &mut Vec<String>, instructions: &str, target: &str) {
    lines.push("--- Current Request ---".to_string());
    if instructions.trim().is_empty() {
        lines.push("User Instructions: [Not provided, infer from context or task]".to_string());
    } else {
        lines.push(format!("User Instructions: {}", instructions));
    }
    lines.push(target.to_string());
    lines.push("--- End Current Request ---\n".to_string());
}

fn push_guidance(lines: &mut Vec<String>, task: &[String]) {
    lines.push("--- Task Guidance ---".to_string());
    lines.push(
        "Based on the general instructions, file context, and the current request:".to_string(),
    );
    lines.extend(task.iter().cloned());
    lines.push("Be concise and accurate. If generating code, ensure it is runnable, follows best practices, and is well-commented unless otherwise specified.".to_string());
    lines.push(RAW_OUTPUT_GUIDANCE.to_string());
    lines.push("--- End Task Guidance ---".to_string());
}

/// Builds the prompt for generating a new file.
pub fn generation_prompt(general: Option<&str>, filename: &str, instructions: &str) -> String {
    let mut lines = Vec::new();
    push_general(&mut lines, general);
    push_request(
        &mut lines,
        instructions,
        &format!("Target Filename (for generation): {}", filename),
    );
    push_guidance(
        &mut lines,
        &[format!("Generate the complete content for the file '{}'.", filename)],
    );
    lines.join("\n")
}

/// Builds the prompt for modifying an existing file.
///
/// The current content is expected as a context blob labeled `filepath`.
pub fn modification_prompt(general: Option<&str>, filepath: &str, instructions: &str) -> String {
    let mut lines = Vec::new();
    push_general(&mut lines, general);
    push_request(
        &mut lines,
        instructions,
        &format!("Target Filepath (for modification): {}", filepath),
    );
    push_guidance(
        &mut lines,
        &[
            format!(
                "Generate the new, complete content for the file '{}' after applying the requested modifications.",
                filepath
            ),
            "Ensure you provide the *entire* modified file content, not just the changed parts or a diff.".to_string(),
        ],
    );
    lines.join("\n")
}

/// Builds a chat prompt from recent history and the new message.
pub fn chat_prompt(general: Option<&str>, history: &[Turn], message: &str) -> String {
    let mut lines = Vec::new();
    push_general(&mut lines, general);

    if !history.is_empty() {
        lines.push("--- Recent Conversation History ---".to_string());
        for turn in history {
            let speaker = match turn.speaker {
                Speaker::User => "User",
                Speaker::Assistant => "Assistant",
            };
            lines.push(format!("{}: {}", speaker, turn.text));
        }
        lines.push("--- End History ---\n".to_string());
    }

    lines.push("--- Current User Message ---".to_string());
    lines.push(message.to_string());
    lines.push("--- End User Message ---".to_string());
    lines.push(
        "\nTask: Respond helpfully to the user's message, considering the instructions and conversation history."
            .to_string(),
    );
    lines.join("\n")
}

/// Builds the prompt asking for a project summary.
///
/// File contents are expected as context blobs.
pub fn sync_prompt(general: Option<&str>) -> String {
    let mut lines = Vec::new();
    push_general(&mut lines, general);
    lines.push("--- Current Request ---".to_string());
    lines.push("Request Type: project sync".to_string());
    lines.push("--- End Current Request ---\n".to_string());
    lines.push("Task: Provide a concise summary of the project based on the provided file context, its purpose, and any potential issues or suggestions.".to_string());
    lines.join("\n")
}
