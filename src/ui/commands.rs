use crate::app::AppMsg;
use crate::models::PersonaInput;
use crate::services::files::PendingFile;
use crate::services::theme::{self, Theme};

pub const HELP: &str = "\
Type a message to send it. Commands:
  /new                    start a new chat
  /list                   list chats
  /open <id>              open a chat
  /delete <id>            delete a chat
  /rename <id>            rename a chat (type the new name, /esc to cancel, /blur to leave the field)
  /attach <path>...       attach files to the next message
  /detach <name>          remove an attached file
  /models, /personas      list models and personas
  /refresh-models         ask the backend to re-read its models
  /model <id>             select a model
  /persona <id|none>      select a persona
  /persona-add <name> | <system prompt>
  /persona-edit <id> <name> | <system prompt>
  /persona-del <id>       delete a persona
  /theme [light|dark]     switch or toggle the theme
  /settings [url [count]] show or change the LM Studio URL
  /quit                   exit";

#[derive(Debug)]
pub enum Input {
    Msg(AppMsg),
    Batch(Vec<AppMsg>),
    Help,
    Quit,
    Invalid(String),
}

/// Map one line of terminal input to a controller message. While a rename is
/// open, plain text edits the name and submits it.
pub fn parse_line(line: &str, renaming: bool) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        if renaming {
            return Some(Input::Batch(vec![
                AppMsg::EditRename(trimmed.to_string()),
                AppMsg::SubmitRename,
            ]));
        }
        return Some(Input::Msg(AppMsg::SendMessage(line.to_string())));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let rest = command.trim_start()[name.len()..].trim();
    let input = match (name, args.as_slice()) {
        ("persona-add", _) => match persona_input(rest) {
            Some(input) => Input::Msg(AppMsg::SavePersona(None, input)),
            None => Input::Invalid("Usage: /persona-add <name> | <system prompt>".to_string()),
        },
        ("persona-edit", [id, ..]) => {
            let body = rest[id.len()..].trim();
            match persona_input(body) {
                Some(input) => id_arg(id, |id| AppMsg::SavePersona(Some(id), input)),
                None => Input::Invalid("Usage: /persona-edit <id> <name> | <system prompt>".to_string()),
            }
        }
        ("persona-del", [id]) => id_arg(id, AppMsg::DeletePersona),
        ("help", _) => Input::Help,
        ("quit" | "exit", _) => Input::Quit,
        ("new", []) => Input::Msg(AppMsg::NewChat),
        ("list", []) => Input::Msg(AppMsg::ListConversations),
        ("open", [id]) => id_arg(id, AppMsg::SelectConversation),
        ("delete", [id]) => id_arg(id, AppMsg::DeleteConversation),
        ("rename", [id]) => id_arg(id, AppMsg::StartRename),
        ("esc", []) => Input::Msg(AppMsg::CancelRename),
        ("blur", []) => Input::Msg(AppMsg::BlurRename),
        ("attach", paths) if !paths.is_empty() => Input::Msg(AppMsg::Attach(
            paths.iter().map(|p| PendingFile::from_path(*p)).collect(),
        )),
        ("detach", [name]) => Input::Msg(AppMsg::Detach(name.to_string())),
        ("models" | "personas", []) => Input::Msg(AppMsg::LoadCatalog),
        ("refresh-models", []) => Input::Msg(AppMsg::RefreshModels),
        ("model", [id]) => Input::Msg(AppMsg::SelectModel(id.to_string())),
        ("persona", ["none"]) => Input::Msg(AppMsg::SelectPersona(None)),
        ("persona", [id]) => id_arg(id, |id| AppMsg::SelectPersona(Some(id))),
        ("theme", []) => Input::Msg(AppMsg::SetTheme(theme::current().toggled())),
        ("theme", [value]) => match Theme::from_str(value) {
            Some(theme) => Input::Msg(AppMsg::SetTheme(theme)),
            None => Input::Invalid(format!("Unknown theme: {}", value)),
        },
        ("settings", []) => Input::Msg(AppMsg::ShowSettings),
        ("settings", [url]) => Input::Msg(AppMsg::UpdateSettings(url.to_string(), None)),
        ("settings", [url, count]) => match count.parse::<u32>() {
            Ok(count) => Input::Msg(AppMsg::UpdateSettings(url.to_string(), Some(count))),
            Err(_) => Input::Invalid(format!("Not a message count: {}", count)),
        },
        _ => Input::Invalid(format!("Unknown command: /{} (try /help)", command)),
    };
    Some(input)
}

fn persona_input(raw: &str) -> Option<PersonaInput> {
    let (name, system_prompt) = raw.split_once('|')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(PersonaInput {
        name: name.to_string(),
        system_prompt: system_prompt.trim().to_string(),
    })
}

fn id_arg(raw: &str, to_msg: impl FnOnce(i64) -> AppMsg) -> Input {
    match raw.parse::<i64>() {
        Ok(id) => Input::Msg(to_msg(id)),
        Err(_) => Input::Invalid(format!("Not an id: {}", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_sends_or_renames() {
        assert!(matches!(
            parse_line("hello there", false),
            Some(Input::Msg(AppMsg::SendMessage(ref t))) if t == "hello there"
        ));
        match parse_line("  New name ", true) {
            Some(Input::Batch(msgs)) => {
                assert!(matches!(&msgs[0], AppMsg::EditRename(t) if t == "New name"));
                assert!(matches!(msgs[1], AppMsg::SubmitRename));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_line("   ", false).is_none());
    }

    #[test]
    fn test_commands() {
        assert!(matches!(parse_line("/open 12", false), Some(Input::Msg(AppMsg::SelectConversation(12)))));
        assert!(matches!(parse_line("/persona none", false), Some(Input::Msg(AppMsg::SelectPersona(None)))));
        assert!(matches!(parse_line("/theme dark", false), Some(Input::Msg(AppMsg::SetTheme(Theme::Dark)))));
        assert!(matches!(
            parse_line("/attach a.txt docs/b.md", false),
            Some(Input::Msg(AppMsg::Attach(ref files))) if files.len() == 2 && files[1].name == "b.md"
        ));
        assert!(matches!(parse_line("/quit", true), Some(Input::Quit)));
    }

    #[test]
    fn test_persona_commands_keep_spacing() {
        match parse_line("/persona-edit 4 Tutor | Explain  step by step.", false) {
            Some(Input::Msg(AppMsg::SavePersona(Some(4), input))) => {
                assert_eq!(input.name, "Tutor");
                assert_eq!(input.system_prompt, "Explain  step by step.");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_line("/persona-add | no name", false), Some(Input::Invalid(_))));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(matches!(parse_line("/open twelve", false), Some(Input::Invalid(_))));
        assert!(matches!(parse_line("/frobnicate", false), Some(Input::Invalid(_))));
        assert!(matches!(parse_line("/settings http://x 1e3", false), Some(Input::Invalid(_))));
    }
}
