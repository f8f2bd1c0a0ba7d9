use crate::auth::Credential;
use crate::ipc::error::{auth_err, err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (Some(username), Some(password)) = (str_param(req, "username"), str_param(req, "password"))
    else {
        return err(&req.id, "bad_params", "missing username or password", None);
    };

    match auth.login(store, &username, &password) {
        Ok(session) => ok(
            &req.id,
            json!({ "user": serde_json::to_value(&session).unwrap_or(json!(null)) }),
        ),
        Err(e) => auth_err(&req.id, &e),
    }
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (Some(username), Some(password), Some(name), Some(role)) = (
        str_param(req, "username"),
        str_param(req, "password"),
        str_param(req, "name"),
        str_param(req, "role"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing username, password, name or role",
            None,
        );
    };

    let credential = Credential {
        username,
        password,
        name,
        role,
    };
    match auth.register(store, &credential) {
        Ok(created) => ok(
            &req.id,
            json!({
                "user": {
                    "username": created.username,
                    "name": created.name,
                    "role": created.role,
                }
            }),
        ),
        Err(e) => auth_err(&req.id, &e),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.auth.logout();
    ok(&req.id, json!({ "redirect": "login" }))
}

fn handle_current_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = state
        .auth
        .current_user()
        .and_then(|s| serde_json::to_value(&s).ok())
        .unwrap_or(json!(null));
    ok(&req.id, json!({ "user": user }))
}

fn handle_require(state: &mut AppState, req: &Request) -> serde_json::Value {
    let authenticated = state.auth.require_auth();
    ok(
        &req.id,
        json!({
            "authenticated": authenticated,
            "redirect": if authenticated { json!(null) } else { json!("login") },
        }),
    )
}

fn handle_change_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { store, auth, .. } = state;
    let Some(store) = store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (Some(old_password), Some(new_password)) = (
        str_param(req, "oldPassword"),
        str_param(req, "newPassword"),
    ) else {
        return err(
            &req.id,
            "bad_params",
            "missing oldPassword or newPassword",
            None,
        );
    };

    match auth.change_password(store, &old_password, &new_password) {
        Ok(()) => ok(&req.id, json!({ "changed": true })),
        Err(e) => auth_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.register" => Some(handle_register(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.currentUser" => Some(handle_current_user(state, req)),
        "auth.require" => Some(handle_require(state, req)),
        "auth.changePassword" => Some(handle_change_password(state, req)),
        _ => None,
    }
}
