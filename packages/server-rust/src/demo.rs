//! In-memory demo API: user CRUD routes and number procedures.
//!
//! [`catalog`] holds the declarations shared with clients; [`index`] attaches
//! the server-side actions and handlers to them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, Method};
use parking_lot::RwLock;
use relay_core::{
    AccessPolicy, Action, Catalog, ContentKind, JsonSchema, Procedure, RelayError, RelayIndex, Route, Session,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::session::SessionResolver;

const UUID_PATTERN: &str = "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
struct UserFields {
    name: String,
    email: String,
}

/// Users keyed by id.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<BTreeMap<String, User>>,
}

impl UserStore {
    fn create(&self, fields: UserFields) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        let user = User {
            id: id.clone(),
            name: fields.name,
            email: fields.email,
            created_at,
        };
        self.users.write().insert(id.clone(), user);
        id
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    fn update(&self, id: &str, fields: UserFields) -> bool {
        match self.users.write().get_mut(id) {
            Some(user) => {
                user.name = fields.name;
                user.email = fields.email;
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: &str) {
        self.users.write().remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

fn schema(document: Value) -> anyhow::Result<JsonSchema> {
    Ok(JsonSchema::new(document)?)
}

fn user_id_params() -> anyhow::Result<JsonSchema> {
    schema(json!({
        "type": "object",
        "properties": { "userId": { "type": "string", "pattern": UUID_PATTERN } },
        "required": ["userId"]
    }))
}

fn user_fields() -> anyhow::Result<JsonSchema> {
    schema(json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "email": { "type": "string", "pattern": "^[^@\\s]+@[^@\\s]+$" }
        },
        "required": ["name", "email"]
    }))
}

fn user() -> anyhow::Result<JsonSchema> {
    schema(json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "pattern": UUID_PATTERN },
            "name": { "type": "string" },
            "email": { "type": "string" },
            "createdAt": { "type": "integer", "minimum": 0 }
        },
        "required": ["id", "name", "email", "createdAt"]
    }))
}

fn avatar_upload() -> anyhow::Result<JsonSchema> {
    schema(json!({
        "type": "object",
        "properties": {
            "avatar": {
                "type": "object",
                "properties": {
                    "filename": { "type": "string" },
                    "data": { "type": "string" }
                },
                "required": ["filename", "data"]
            },
            "caption": { "type": "string" }
        },
        "required": ["avatar"]
    }))
}

fn number_pair() -> anyhow::Result<JsonSchema> {
    schema(json!({
        "type": "array",
        "prefixItems": [{ "type": "number" }, { "type": "number" }],
        "items": false,
        "minItems": 2
    }))
}

fn number() -> anyhow::Result<JsonSchema> {
    schema(json!({ "type": "number" }))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Declarations of the demo API, without handlers.
///
/// # Errors
///
/// Returns an error if a schema fails to compile or two declarations clash.
pub fn catalog() -> anyhow::Result<Catalog> {
    let admin_only = AccessPolicy::Session.and(|ctx| ctx.session().is_ok_and(|s| s.has_role("admin")));

    let catalog = Catalog::builder()
        .route(
            "users.create",
            Route::post("/users")
                .body(user_fields()?)
                .output(schema(json!({ "type": "string" }))?)
                .access(AccessPolicy::Public),
        )
        .route(
            "users.me",
            Route::get("/users/me")
                .output(schema(json!({
                    "type": "object",
                    "properties": { "accountId": { "type": "string" } },
                    "required": ["accountId"]
                }))?)
                .access(AccessPolicy::Session),
        )
        .route(
            "users.get",
            Route::get("/users/:userId")
                .params(user_id_params()?)
                .output(user()?)
                .access(AccessPolicy::Public),
        )
        .route(
            "users.update",
            Route::put("/users/:userId")
                .params(user_id_params()?)
                .body(user_fields()?)
                .access(AccessPolicy::Session),
        )
        .route(
            "users.delete",
            Route::delete("/users/:userId")
                .params(user_id_params()?)
                .access(admin_only),
        )
        .route(
            "users.avatar",
            Route::post("/users/:userId/avatar")
                .params(user_id_params()?)
                .body(avatar_upload()?)
                .content(ContentKind::Form)
                .access(AccessPolicy::Public),
        )
        .route(
            "numbers.addTwo",
            Route::get("/add-two")
                .query(
                    schema(json!({
                        "type": "object",
                        "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                        "required": ["a", "b"]
                    }))?
                    .coercing(),
                )
                .output(number()?)
                .access(AccessPolicy::Public),
        )
        .procedure(
            "numbers.add",
            Procedure::method("numbers:add").params(number_pair()?).result(number()?),
        )
        .build()?;

    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Rejects negative numbers and sums the pair as `{sum}`.
fn add_numbers() -> anyhow::Result<Action> {
    let action = Action::make("numbers:add")
        .input(number_pair()?)
        .output(schema(json!({
            "type": "object",
            "properties": { "sum": { "type": "number" } },
            "required": ["sum"]
        }))?)
        .handle(|input| async move {
            let (a, b) = match input.as_array().map(Vec::as_slice) {
                Some([a, b]) => (a.clone(), b.clone()),
                _ => return Err(RelayError::bad_request("Expected two numbers").into()),
            };
            if a.as_f64().unwrap_or_default() < 0.0 || b.as_f64().unwrap_or_default() < 0.0 {
                return Err(RelayError::bad_request("Invalid numbers provided").into());
            }
            Ok(json!({ "sum": sum(&a, &b) }))
        });
    Ok(action)
}

/// Integer sum when both operands are integers and it fits in `i64`, float
/// sum otherwise.
fn sum(a: &Value, b: &Value) -> Value {
    let float = || Value::from(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default());
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_add(y).map_or_else(float, Value::from),
        _ => float(),
    }
}

/// Loads the user named by `userId` into the `user` output.
fn load_user(store: &Arc<UserStore>) -> anyhow::Result<Action> {
    let store = Arc::clone(store);
    let action = Action::make("users:load")
        .input(user_id_params()?)
        .handle(move |input| {
            let store = Arc::clone(&store);
            async move {
                let id = input.get("userId").and_then(Value::as_str).unwrap_or_default();
                match store.get(id) {
                    Some(user) => Ok(json!({ "user": user })),
                    None => Err(RelayError::not_found(format!("User '{id}' does not exist")).into()),
                }
            }
        });
    Ok(action)
}

/// Builds the demo index over `store`.
///
/// # Errors
///
/// Returns an error if the catalog or the index cannot be built.
pub fn index(store: &Arc<UserStore>) -> anyhow::Result<RelayIndex> {
    let catalog = catalog()?;

    let users = Arc::clone(store);
    let create = catalog.route(&Method::POST, "/users")?.handle(move |ctx| {
        let users = Arc::clone(&users);
        async move {
            let fields: UserFields = ctx.parse()?;
            let id = users.create(fields);
            info!(user_id = %id, "user created");
            Ok(Value::String(id))
        }
    });

    let me = catalog.route(&Method::GET, "/users/me")?.handle(|ctx| async move {
        let account = ctx.request().account_id()?;
        Ok(json!({ "accountId": account }))
    });

    let get = catalog
        .route(&Method::GET, "/users/:userId")?
        .action(load_user(store)?.derive(|scope| json!({ "userId": scope.input.get("userId") })))
        .handle(|ctx| async move { Ok(ctx.get("user").cloned().unwrap_or(Value::Null)) });

    let users = Arc::clone(store);
    let update = catalog.route(&Method::PUT, "/users/:userId")?.handle(move |ctx| {
        let users = Arc::clone(&users);
        async move {
            let id = ctx.str("userId").unwrap_or_default().to_string();
            let fields: UserFields = ctx.parse()?;
            if users.update(&id, fields) {
                Ok(())
            } else {
                Err(RelayError::not_found(format!("User '{id}' does not exist")).into())
            }
        }
    });

    let users = Arc::clone(store);
    let delete = catalog.route(&Method::DELETE, "/users/:userId")?.handle(move |ctx| {
        let users = Arc::clone(&users);
        async move {
            users.remove(ctx.str("userId").unwrap_or_default());
            Ok(())
        }
    });

    let avatar = catalog
        .route(&Method::POST, "/users/:userId/avatar")?
        .handle(|ctx| async move {
            let avatar = ctx.get("avatar").cloned().unwrap_or(Value::Null);
            Ok(json!({
                "userId": ctx.str("userId"),
                "filename": avatar.get("filename"),
                "size": avatar.get("size"),
            }))
        });

    let add_two = catalog.route(&Method::GET, "/add-two")?.handle(|ctx| async move {
        let a = ctx.get("a").cloned().unwrap_or(Value::Null);
        let b = ctx.get("b").cloned().unwrap_or(Value::Null);
        Ok(sum(&a, &b))
    });

    let add = catalog
        .procedure("numbers:add")?
        .action(add_numbers()?)
        .handle(|ctx| async move { Ok(ctx.outputs().get("sum").cloned().unwrap_or(Value::Null)) });

    let index = RelayIndex::with([
        create.into(),
        me.into(),
        get.into(),
        update.into(),
        delete.into(),
        avatar.into(),
        add_two.into(),
        relay_core::Entry::from(add),
    ])?;
    Ok(index)
}

/// Demo dispatcher over a fresh store, with [`DemoSessions`].
///
/// # Errors
///
/// Returns an error if the index cannot be built.
pub fn dispatcher(config: DispatchConfig) -> anyhow::Result<Dispatcher> {
    let store = Arc::new(UserStore::default());
    Ok(Dispatcher::new(index(&store)?, config).with_sessions(DemoSessions))
}

// ---------------------------------------------------------------------------
// DemoSessions
// ---------------------------------------------------------------------------

/// Reads `Authorization: Bearer <account>[:role,role]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoSessions;

#[async_trait]
impl SessionResolver for DemoSessions {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();
        if token.is_empty() {
            return None;
        }
        let (account, roles) = token.split_once(':').unwrap_or((token, ""));
        let roles = roles.split(',').filter(|r| !r.is_empty()).map(str::to_string);
        Some(Session::new(format!("session-{account}"), account).with_roles(roles))
    }
}
