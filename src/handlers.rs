use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{check_authorization_level, AuthKeys, AuthorizationLevel};
use crate::error::{Error, Result};
use crate::schemas::UserId;
use crate::service::{ExpenseUpdate, NewExpense, NewMember, NewPool, PoolService, PoolUpdate};
use crate::split::SplitRequest;
use crate::upi;

type Service = web::Data<PoolService>;
type Keys = web::Data<AuthKeys>;

#[derive(Deserialize, Serialize)]
struct UpiJson {
    upi_id: String,
}

#[derive(Deserialize, Serialize)]
struct InviteJson {
    email: String,
}

#[derive(Deserialize, Serialize)]
struct MemberPath {
    id: String,
    user: String,
}

fn authorization(request: &HttpRequest, keys: &AuthKeys) -> Result<AuthorizationLevel> {
    check_authorization_level(request, keys).ok_or(Error::Unauthenticated)
}

/// Most operations act on behalf of a user; the service token cannot.
fn user(request: &HttpRequest, keys: &AuthKeys) -> Result<UserId> {
    match authorization(request, keys)? {
        AuthorizationLevel::User(user) => Ok(user),
        AuthorizationLevel::Service => Err(Error::Authorization(
            "this operation requires a user token".to_string(),
        )),
    }
}

/// Reads are open to the service and to active members of the pool.
async fn require_reader(
    service: &PoolService,
    request: &HttpRequest,
    keys: &AuthKeys,
    pool_id: &str,
) -> Result<()> {
    match authorization(request, keys)? {
        AuthorizationLevel::Service => Ok(()),
        AuthorizationLevel::User(user) => service.require_member(pool_id, &user).await.map(|_| ()),
    }
}

#[put("/pools/{id}")]
async fn create_pool(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewPool>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let pool = service
        .create_pool(&id.into_inner(), json.into_inner(), &user)
        .await?;
    Ok(HttpResponse::Created().json(pool))
}

#[patch("/pools/{id}")]
async fn update_pool(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<PoolUpdate>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let pool = service.update_pool(&id, json.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(pool))
}

#[delete("/pools/{id}")]
async fn close_pool(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    Ok(HttpResponse::Ok().json(service.close_pool(&id, &user).await?))
}

#[get("/pools/{id}/balance")]
async fn get_balance(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    require_reader(&service, &request, &keys, &id).await?;
    Ok(HttpResponse::Ok().json(service.compute_balances(&id).await?))
}

#[get("/pools/{id}/summary")]
async fn get_summary(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    require_reader(&service, &request, &keys, &id).await?;
    Ok(HttpResponse::Ok().json(service.pool_summary(&id).await?))
}

#[post("/pools/{id}/members")]
async fn add_member(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewMember>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let member = service.add_member(&id, json.into_inner(), &user).await?;
    Ok(HttpResponse::Created().json(member))
}

#[post("/pools/{id}/invite")]
async fn invite(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<InviteJson>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    service.invite(&id, &json.email, &user).await?;
    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "message": format!("Invitation sent to {}", json.email),
    })))
}

#[delete("/pools/{id}/members/{user}")]
async fn remove_member(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    path: web::Path<MemberPath>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let member = service.remove_member(&path.id, &path.user, &user).await?;
    Ok(HttpResponse::Ok().json(member))
}

#[get("/pools/{id}/expenses")]
async fn list_expenses(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    require_reader(&service, &request, &keys, &id).await?;
    Ok(HttpResponse::Ok().json(service.expenses(&id).await?))
}

#[post("/pools/{id}/expenses")]
async fn add_expense(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<NewExpense>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let expense = service.add_expense(&id, json.into_inner(), &user).await?;
    Ok(HttpResponse::Created().json(expense))
}

#[post("/expenses/{id}/split")]
async fn split_expense(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<SplitRequest>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let splits = service
        .allocate_splits(&id, json.into_inner(), &user)
        .await?;
    Ok(HttpResponse::Ok().json(splits))
}

#[patch("/expenses/{id}")]
async fn update_expense(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<ExpenseUpdate>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let expense = service.update_expense(&id, json.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[delete("/expenses/{id}")]
async fn delete_expense(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    service.delete_expense(&id, &user).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/pools/{id}/settle")]
async fn settle_pool(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    require_reader(&service, &request, &keys, &id).await?;
    let settlements = service.suggest_and_persist_settlements(&id).await?;
    Ok(HttpResponse::Ok().json(settlements))
}

#[get("/pools/{id}/transactions")]
async fn list_transactions(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    require_reader(&service, &request, &keys, &id).await?;
    Ok(HttpResponse::Ok().json(service.transactions(&id).await?))
}

#[post("/transactions/{id}/settle")]
async fn settle_transaction(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    Ok(HttpResponse::Ok().json(service.mark_settled(&id, &user).await?))
}

#[post("/transactions/{id}/complete")]
async fn complete_transaction(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    if authorization(&request, &keys)? != AuthorizationLevel::Service {
        return Err(Error::Authorization(
            "only the service can complete transactions".to_string(),
        ));
    }
    Ok(HttpResponse::Ok().json(service.mark_completed(&id).await?))
}

#[post("/transactions/{id}/cancel")]
async fn cancel_transaction(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    Ok(HttpResponse::Ok().json(service.cancel_transaction(&id, &user).await?))
}

#[get("/transactions/{id}/payment-link")]
async fn payment_link(
    service: Service,
    keys: Keys,
    request: HttpRequest,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    let transaction = service.transaction(&id).await?;
    if transaction.from_user != user && transaction.to_user != user {
        return Err(Error::Authorization(
            "only the parties of a transaction can request its payment link".to_string(),
        ));
    }
    Ok(HttpResponse::Ok().json(service.payment_request(&id).await?))
}

#[get("/me/pools")]
async fn my_pools(service: Service, keys: Keys, request: HttpRequest) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    Ok(HttpResponse::Ok().json(service.user_pools(&user).await?))
}

#[get("/me/dashboard")]
async fn my_dashboard(service: Service, keys: Keys, request: HttpRequest) -> Result<HttpResponse> {
    let user = user(&request, &keys)?;
    Ok(HttpResponse::Ok().json(service.dashboard(&user).await?))
}

#[post("/upi/validate")]
async fn validate_upi(
    keys: Keys,
    request: HttpRequest,
    json: web::Json<UpiJson>,
) -> Result<HttpResponse> {
    authorization(&request, &keys)?;
    let upi_id = upi::validate_upi_id(&json.upi_id)?;
    let provider = upi::provider_info(&json.upi_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "upi_id": upi_id,
        "provider": provider,
    })))
}

/// Registers every route. The caller provides `web::Data<PoolService>` and
/// `web::Data<AuthKeys>`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _request| Error::Validation(err.to_string()).into()),
    )
    .service(create_pool)
    .service(update_pool)
    .service(close_pool)
    .service(get_balance)
    .service(get_summary)
    .service(add_member)
    .service(invite)
    .service(remove_member)
    .service(list_expenses)
    .service(add_expense)
    .service(split_expense)
    .service(update_expense)
    .service(delete_expense)
    .service(settle_pool)
    .service(list_transactions)
    .service(settle_transaction)
    .service(complete_transaction)
    .service(cancel_transaction)
    .service(payment_link)
    .service(my_pools)
    .service(my_dashboard)
    .service(validate_upi);
}
