use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use std::{result::Result as StdResult, sync::Arc};
use tokio::net::TcpListener;

use crate::{
    catalog::Catalog,
    core::{
        model::{self as domain},
        Application,
    },
    error::{Error, Result},
    infrastructure::{Storage, TerminationWaiter},
};

pub mod model;

const API_RESOURCE_PREFIX: &str = "/api/v1";

type ApiResult<A> = StdResult<A, ApiError>;

type ApplicationInner<S, C> = Arc<Application<S, C>>;
pub struct Api<S, C>(ApplicationInner<S, C>);

impl<S, C> Api<S, C>
where
    S: Storage,
    C: Catalog,
{
    pub fn new(application: Application<S, C>) -> Self {
        Self(Arc::new(application))
    }

    /// Serves until the termination signal, then drains open connections.
    pub async fn start(self, listener: TcpListener, termination: TerminationWaiter) -> Result<()> {
        let Self(application) = self;
        let routes = routing_configuration().with_state(application);
        Ok(axum::serve(listener, routes)
            .with_graceful_shutdown(async move { termination.wait().await })
            .await?)
    }
}

fn routing_configuration<S, C>() -> Router<ApplicationInner<S, C>>
where
    S: Storage,
    C: Catalog,
{
    let books = Router::new()
        .route("/search", get(books::search))
        .route("/popular", get(books::popular))
        .route("/wellness", get(books::wellness))
        .route("/search-advanced", get(books::search_advanced))
        .route("/subjects", get(books::subjects))
        .route("/collection", get(books::collection).post(books::save))
        .route("/collection/:id", delete(books::remove));

    let diary = Router::new()
        .route("/", get(diary::list).post(diary::create))
        .route("/search", get(diary::search))
        .route("/tag/:tag", get(diary::by_tag))
        .route("/mood/:mood", get(diary::by_mood))
        .route("/range", get(diary::created_between))
        .route("/with-books", get(diary::with_books))
        .route("/book", get(diary::by_book_title))
        .route("/moods", get(diary::moods))
        .route(
            "/:id",
            get(diary::get).put(diary::update).delete(diary::remove),
        );

    let api = Router::new().nest("/books", books).nest("/diary", diary);

    Router::new()
        .route("/", get(system_root))
        .nest(API_RESOURCE_PREFIX, api)
}

enum ApiError {
    Internal(Error),
    ServiceStatus(StatusCode),
}

impl ApiError {
    fn not_found<A>() -> ApiResult<A> {
        Err(ApiError::ServiceStatus(StatusCode::NOT_FOUND))
    }
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        Self::Internal(value)
    }
}

fn status_of(error: &Error) -> StatusCode {
    match error {
        Error::Validation(..) => StatusCode::BAD_REQUEST,
        Error::NotFound(..) => StatusCode::NOT_FOUND,
        Error::ProviderUnavailable(..) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Internal(error) => {
                let status = status_of(&error);
                if status.is_server_error() {
                    tracing::error!(%error, "Request failed");
                }

                let message = model::ErrorMessage {
                    error: error.to_string(),
                };
                (status, Json(message)).into_response()
            }
            ApiError::ServiceStatus(status) => status.into_response(),
        }
    }
}

fn resource_location(resource_type: &str, id: &str) -> String {
    format!("{API_RESOURCE_PREFIX}/{resource_type}/{id}")
}

fn created_response<A>(location: &str, body: A) -> ApiResult<(StatusCode, HeaderMap, Json<A>)> {
    let mut headers = HeaderMap::default();
    headers.insert(
        "Location",
        HeaderValue::from_str(location).map_err(Error::from)?,
    );
    Ok((StatusCode::CREATED, headers, Json(body)))
}

mod books {
    use super::*;

    pub async fn search<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(params): Query<model::SearchParams>,
    ) -> ApiResult<Json<Vec<model::Book>>>
    where
        S: Storage,
        C: Catalog,
    {
        let page = params.page()?;
        let books = application
            .search_books(params.q.as_deref(), params.subject.as_deref(), page)
            .await?;

        Ok(Json(books.into_iter().map(|b| b.into()).collect()))
    }

    pub async fn popular<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(params): Query<model::PageParams>,
    ) -> ApiResult<Json<Vec<model::Book>>>
    where
        S: Storage,
        C: Catalog,
    {
        let books = application.popular_books(params.page()?).await?;
        Ok(Json(books.into_iter().map(|b| b.into()).collect()))
    }

    pub async fn wellness<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(params): Query<model::WellnessParams>,
    ) -> ApiResult<Json<Vec<model::Book>>>
    where
        S: Storage,
        C: Catalog,
    {
        let page = params.page()?;
        let books = application
            .wellness_books(params.category.as_deref(), page)
            .await?;

        Ok(Json(books.into_iter().map(|b| b.into()).collect()))
    }

    pub async fn search_advanced<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(params): Query<model::AdvancedParams>,
    ) -> ApiResult<Json<Vec<model::Book>>>
    where
        S: Storage,
        C: Catalog,
    {
        let (search, page) = params.into_search()?;
        let books = application.search_books_advanced(&search, page).await?;

        Ok(Json(books.into_iter().map(|b| b.into()).collect()))
    }

    pub async fn subjects<S, C>(
        State(application): State<ApplicationInner<S, C>>,
    ) -> ApiResult<Json<Vec<String>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.wellness_subjects()))
    }

    pub async fn collection<S, C>(
        State(application): State<ApplicationInner<S, C>>,
    ) -> ApiResult<Json<Vec<model::Book>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(
            application
                .saved_books()?
                .into_iter()
                .map(|b| b.into())
                .collect(),
        ))
    }

    pub async fn save<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Json(book): Json<model::Book>,
    ) -> ApiResult<Json<model::Book>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.save_book(book.into())?.into()))
    }

    pub async fn remove<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(model::CatalogId(id)): Path<model::CatalogId>,
    ) -> ApiResult<StatusCode>
    where
        S: Storage,
        C: Catalog,
    {
        application.remove_book(&id)?;
        Ok(StatusCode::NO_CONTENT)
    }
}

mod diary {
    use super::*;

    use domain::query;

    pub async fn get<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(model::EntryId(id)): Path<model::EntryId>,
    ) -> ApiResult<Json<domain::DiaryEntry>>
    where
        S: Storage,
        C: Catalog,
    {
        if let Some(entry) = application.issue_query(query::EntryById(id)).await {
            Ok(Json(entry))
        } else {
            ApiError::not_found()
        }
    }

    pub async fn list<S, C>(
        State(application): State<ApplicationInner<S, C>>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.issue_query(query::AllEntries).await))
    }

    // return a URI to the created resource
    pub async fn create<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Json(new_entry): Json<model::NewEntry>,
    ) -> ApiResult<Response>
    where
        S: Storage,
        C: Catalog,
    {
        let entry = application.create_entry(new_entry.into()).await?;
        let location = resource_location("diary", &entry.id.to_string());
        Ok(created_response(&location, entry)?.into_response())
    }

    pub async fn update<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(model::EntryId(id)): Path<model::EntryId>,
        Json(revision): Json<model::NewEntry>,
    ) -> ApiResult<Json<domain::DiaryEntry>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.update_entry(id, revision.into()).await?))
    }

    pub async fn remove<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(model::EntryId(id)): Path<model::EntryId>,
    ) -> ApiResult<StatusCode>
    where
        S: Storage,
        C: Catalog,
    {
        application.delete_entry(id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    pub async fn search<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(model::TextSearchParams { q, mood }): Query<model::TextSearchParams>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        let mood = mood
            .as_deref()
            .map(str::trim)
            .filter(|mood| !mood.is_empty())
            .map(str::parse::<domain::Mood>)
            .transpose()?;

        Ok(Json(
            application
                .issue_query(query::TextSearch { text: q, mood })
                .await,
        ))
    }

    pub async fn by_tag<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(tag): Path<String>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.issue_query(query::EntriesByTag(tag)).await))
    }

    pub async fn by_mood<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Path(mood): Path<String>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        let mood = mood.parse()?;
        Ok(Json(
            application.issue_query(query::EntriesByMood(mood)).await,
        ))
    }

    pub async fn created_between<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(model::RangeParams { from, to }): Query<model::RangeParams>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        if from > to {
            return Err(Error::validation("Range start is after its end").into());
        }

        Ok(Json(
            application
                .issue_query(query::CreatedBetween { from, to })
                .await,
        ))
    }

    pub async fn with_books<S, C>(
        State(application): State<ApplicationInner<S, C>>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.issue_query(query::EntriesWithBooks).await))
    }

    pub async fn by_book_title<S, C>(
        State(application): State<ApplicationInner<S, C>>,
        Query(model::BookTitleParams { title }): Query<model::BookTitleParams>,
    ) -> ApiResult<Json<Vec<domain::DiaryEntry>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(application.entries_by_book_title(&title).await?))
    }

    pub async fn moods<S, C>(
        State(_application): State<ApplicationInner<S, C>>,
    ) -> ApiResult<Json<Vec<model::MoodView>>>
    where
        S: Storage,
        C: Catalog,
    {
        Ok(Json(domain::Mood::ALL.into_iter().map(|m| m.into()).collect()))
    }
}

async fn system_root<S, C>(State(_application): State<ApplicationInner<S, C>>) -> ApiResult<String>
where
    S: Storage,
    C: Catalog,
{
    Ok("Wellspring 0.1 running.".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(error: Error) -> StatusCode {
        ApiError::from(error).into_response().status()
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(status(Error::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(Error::NotFound("diary entry".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(Error::ProviderUnavailable("down".to_owned())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(Error::Generic("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_resources_are_plain_404s() {
        let Err(error) = ApiError::not_found::<()>() else {
            panic!("expected an error")
        };
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn created_resources_carry_their_location() {
        let location = resource_location("diary", "42");
        let (status, headers, _) = created_response(&location, ()).ok().unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers["Location"], "/api/v1/diary/42");
    }
}
