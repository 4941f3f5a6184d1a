use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use maud::{DOCTYPE, Markup, html};
use serde::Serialize;
use tracing::error;

use super::server::AppState;
use crate::db::models::PlayerRecord;
use crate::db::{StorageResult, SUBMISSIONS_LIMIT, TOP_PLAYERS_LIMIT};

/// HTML table of the best times: nickname, score, country.
pub fn render_players_page(page_title: &str, players: &[PlayerRecord]) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (page_title) }
            }
            body {
                table {
                    thead {
                        tr {
                            th { "Nickname" }
                            th { "Score" }
                            th { "Country" }
                        }
                    }
                    tbody {
                        @for player in players {
                            tr {
                                td { (player.name) }
                                td { (player.best_time) }
                                td { (player.country) }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// `GET /`
pub async fn players_page(State(state): State<AppState>) -> Response {
    match state.store.list_top_players(TOP_PLAYERS_LIMIT).await {
        Ok(players) => Html(render_players_page(&state.page_title, &players).into_string()).into_response(),
        Err(e) => {
            error!("Can't load players from store: {:#}", e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// `GET /players.json`
pub async fn players_json(State(state): State<AppState>) -> Response {
    json_listing(
        "players",
        state.store.list_top_players(TOP_PLAYERS_LIMIT).await,
    )
}

/// `GET /results.json`
pub async fn results_json(State(state): State<AppState>) -> Response {
    json_listing(
        "results",
        state.store.list_all_submissions(SUBMISSIONS_LIMIT).await,
    )
}

/// Any failure, loading or encoding, is answered with a bare 404.
fn json_listing<T: Serialize>(what: &str, records: StorageResult<Vec<T>>) -> Response {
    let records = match records {
        Ok(records) => records,
        Err(e) => {
            error!("Can't load {} from store: {:#}", what, e);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match serde_json::to_vec(&records) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("Can't convert {} to json: {}", what, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn player(name: &str, time: i64, country: &str) -> PlayerRecord {
        PlayerRecord {
            name: name.to_string(),
            best_time: time,
            created_at: Utc::now(),
            country: country.to_string(),
            region: String::new(),
            city: String::new(),
            city_lat_long: String::new(),
            source_ip: "1.2.3.4".to_string(),
        }
    }

    #[test]
    fn test_page_lists_players_in_given_order() {
        let page = render_players_page(
            "YoBA highscores",
            &[player("Ann", 90, "RU"), player("Bob", 120, "SE")],
        )
        .into_string();

        assert!(page.contains("<title>YoBA highscores</title>"));
        assert!(page.contains("<th>Nickname</th><th>Score</th><th>Country</th>"));
        assert!(page.contains("<tr><td>Ann</td><td>90</td><td>RU</td></tr>"));

        let ann = page.find("Ann").unwrap();
        let bob = page.find("Bob").unwrap();
        assert!(ann < bob);
    }

    #[test]
    fn test_page_escapes_names() {
        let page = render_players_page("t", &[player("<script>x</script>", 1, "")]).into_string();
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_empty_page_has_table() {
        let page = render_players_page("t", &[]).into_string();
        assert!(page.contains("<tbody></tbody>"));
    }

    #[test]
    fn test_json_listing_failure_is_not_found() {
        let failed: StorageResult<Vec<PlayerRecord>> =
            Err(anyhow::anyhow!("connection reset").into());
        assert_eq!(json_listing("players", failed).status(), StatusCode::NOT_FOUND);

        let ok: StorageResult<Vec<PlayerRecord>> = Ok(vec![player("Ann", 90, "RU")]);
        let response = json_listing("players", ok);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
