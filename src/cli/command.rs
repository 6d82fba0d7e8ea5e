use crate::error::{AppError, AppResult};
use crate::identity::Role;

pub const HELP: &str = "\
Commands:
  login | signup                                   open the login form
  back                                             leave the login form
  submit <email> <password>                        sign in
  register <email> <password> <name> [admin|customer]  create an account and sign in
  logout                                           sign out
  status                                           show the current session
  help                                             show this help
  quit | exit                                      leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowLogin,
    Back,
    Submit { email: String, password: String },
    Register { email: String, password: String, name: String, role: Role },
    Logout,
    Status,
    Help,
    Quit,
}

/// Parse one shell line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> AppResult<Option<Command>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((head, rest)) = parts.split_first() else { return Ok(None) };
    let cmd = match (head.to_lowercase().as_str(), rest) {
        ("login" | "signup", []) => Command::ShowLogin,
        ("back", []) => Command::Back,
        ("submit", [email, password]) => Command::Submit { email: email.to_string(), password: password.to_string() },
        ("submit", _) => return Err(usage("submit <email> <password>")),
        ("register", [email, password, name_and_role @ ..]) if !name_and_role.is_empty() => {
            let (role, name_parts) = match name_and_role.split_last() {
                Some((last, init)) if !init.is_empty() => match last.parse::<Role>() {
                    Ok(role) => (role, init),
                    Err(_) => (Role::Customer, name_and_role),
                },
                _ => (Role::Customer, name_and_role),
            };
            Command::Register {
                email: email.to_string(),
                password: password.to_string(),
                name: name_parts.join(" "),
                role,
            }
        }
        ("register", _) => return Err(usage("register <email> <password> <name> [admin|customer]")),
        ("logout", []) => Command::Logout,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => {
            return Err(AppError::user("unknown_command".to_string(), format!("unknown command '{}', try `help`", other)));
        }
    };
    Ok(Some(cmd))
}

fn usage(text: &str) -> AppError {
    AppError::user("usage".to_string(), format!("usage: {}", text))
}
