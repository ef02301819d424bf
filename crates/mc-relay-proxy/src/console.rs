//! Operator commands read from stdin.

use crate::proxy::Proxy;

const HELP: &str = "Commands:
  list                        show backend sessions
  switch <player> <account>   move a player onto a session
  disconnect <account>        close a backend session
  stop                        shut the proxy down";

/// Run one console line and return what to print.
pub fn dispatch(proxy: &Proxy, line: &str) -> String {
    let mut args = line.split_whitespace();
    let Some(command) = args.next() else {
        return String::new();
    };
    let args: Vec<&str> = args.collect();

    match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("list", []) => {
            let sessions = proxy.list();
            if sessions.is_empty() {
                return "No backend sessions".into();
            }
            let mut out = format!("{} backend sessions:", sessions.len());
            for session in sessions {
                out.push_str(&format!("\n  {session}"));
            }
            out
        }
        ("switch", [player, account]) => match proxy.switch(player, account) {
            Ok(()) => format!("Moved {player} to {account}"),
            Err(e) => format!("Could not switch: {}", e.reason()),
        },
        ("disconnect", [account]) => match proxy.disconnect_account(account) {
            Ok(()) => format!("Disconnected {account}"),
            Err(e) => format!("Could not disconnect: {}", e.reason()),
        },
        ("stop", []) => {
            proxy.shutdown();
            "Stopping".into()
        }
        ("help", _) => HELP.into(),
        ("list" | "switch" | "disconnect" | "stop", _) => {
            format!("Wrong arguments for {command}\n{HELP}")
        }
        _ => format!("Unknown command: {command}. Type \"help\" for help."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeSessionService;
    use crate::proxy::tests::{add_session, test_proxy};

    #[tokio::test]
    async fn list_and_disconnect() {
        let proxy = test_proxy(FakeSessionService::default());
        assert_eq!(dispatch(&proxy, "list"), "No backend sessions");
        let (_alice, _server) = add_session(&proxy, "Alice").await;
        let out = dispatch(&proxy, "list");
        assert!(out.starts_with("1 backend sessions:"));
        assert!(out.contains("Alice"));
        assert_eq!(dispatch(&proxy, "disconnect Alice"), "Disconnected Alice");
        assert!(dispatch(&proxy, "disconnect Alice").starts_with("Could not disconnect"));
    }

    #[test]
    fn unknown_and_malformed_commands() {
        let proxy = test_proxy(FakeSessionService::default());
        assert!(dispatch(&proxy, "fly").starts_with("Unknown command: fly"));
        assert!(dispatch(&proxy, "switch Bob").starts_with("Wrong arguments for switch"));
        assert_eq!(dispatch(&proxy, "   "), "");
        assert!(dispatch(&proxy, "switch Bob Alice").starts_with("Could not switch"));
    }

    #[test]
    fn stop_shuts_down() {
        let proxy = test_proxy(FakeSessionService::default());
        assert_eq!(dispatch(&proxy, "STOP"), "Stopping");
        assert!(proxy.is_shutting_down());
    }
}
