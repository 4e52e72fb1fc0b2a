use seed::{prelude::*, virtual_dom::AtValue, *};
use serde::Deserialize;
use shared::{Coordinate, RouteRequest, RouteResult};
use thiserror::Error;
use wasm_bindgen::{JsCast, prelude::wasm_bindgen};

#[wasm_bindgen(module = "/leaflet_map.js")]
extern "C" {
    #[wasm_bindgen(js_name = initMap)]
    fn init_map();
    #[wasm_bindgen(js_name = destroyMap)]
    fn destroy_map();
    #[wasm_bindgen(js_name = setSubmitEnabled)]
    fn set_submit_enabled(enabled: bool);
}

fn api_root() -> String {
    if let Some(url) = option_env!("FRONTEND_API_ROOT") {
        return url.trim_end_matches('/').to_string();
    }
    "http://localhost:8000/find_path".to_string()
}

pub struct Model {
    page: Page,
    markers: MarkerState,
    submission: SubmissionState,
    result: Option<RouteResult>,
    map_live: bool,
}

impl Model {
    // The whole guard for Submission Control: refuse while a request is in
    // flight or while either marker is still unannounced, otherwise hand
    // back the request and flip to Pending.
    fn accept_submission(&mut self) -> Option<RouteRequest> {
        if self.submission == SubmissionState::Pending {
            return None;
        }
        let request = self.markers.to_request()?;
        self.submission = SubmissionState::Pending;
        Some(request)
    }

    // Everything owned by a mounted Home view is transient and dies with it.
    fn clear_home_state(&mut self) {
        self.markers = MarkerState::default();
        self.result = None;
        self.submission = SubmissionState::Idle;
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Page {
    Home,
    HeatMap,
}

impl Page {
    fn from_url(mut url: Url) -> Self {
        Self::from_slug(url.next_path_part())
    }

    fn from_slug(slug: Option<&str>) -> Self {
        match slug {
            Some("heatmap") => Page::HeatMap,
            _ => Page::Home,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SubmissionState {
    Idle,
    Pending,
}

/// Last reported position of each draggable marker. `None` until the map
/// has announced the marker, which is what makes the submit guard real.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct MarkerState {
    start: Option<Coordinate>,
    end: Option<Coordinate>,
}

impl MarkerState {
    fn apply_move(&mut self, kind: MarkerKind, position: Coordinate) {
        match kind {
            MarkerKind::Start => self.start = Some(position),
            MarkerKind::End => self.end = Some(position),
        }
    }

    fn to_request(&self) -> Option<RouteRequest> {
        Some(RouteRequest::from_endpoints(self.start?, self.end?))
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Start,
    End,
}

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("could not build request: {0}")]
    BadRequest(String),
    #[error("network failure: {0}")]
    Transport(String),
    #[error("routing service returned an error status: {0}")]
    Status(String),
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

pub enum Msg {
    UrlChanged(subs::UrlChanged),
    MarkerMoved { kind: MarkerKind, position: Coordinate },
    Submit,
    RouteFetched(Result<RouteResult, RequestError>),
}

pub fn init(url: Url, orders: &mut impl Orders<Msg>) -> Model {
    orders.subscribe(Msg::UrlChanged);

    orders.stream(streams::window_event(Ev::from("marker-moved"), |event| {
        let event = event
            .dyn_into::<web_sys::CustomEvent>()
            .expect("marker-moved event must be CustomEvent");
        match serde_wasm_bindgen::from_value::<MarkerMovedPayload>(event.detail()) {
            Ok(payload) => {
                web_sys::console::debug_1(
                    &format!(
                        "[frontend] marker {:?} moved to lat={:.6} lon={:.6}",
                        payload.kind, payload.lat, payload.lon
                    )
                    .into(),
                );
                Some(Msg::MarkerMoved {
                    kind: payload.kind,
                    position: Coordinate {
                        lat: payload.lat,
                        lon: payload.lon,
                    },
                })
            }
            Err(err) => {
                web_sys::console::warn_1(
                    &format!("[frontend] ignoring malformed marker-moved event: {err:?}").into(),
                );
                None
            }
        }
    }));

    orders.stream(streams::window_event(Ev::from("route-submit"), |_| {
        Msg::Submit
    }));

    let page = Page::from_url(url);
    let mut model = Model {
        page,
        markers: MarkerState::default(),
        submission: SubmissionState::Idle,
        result: None,
        map_live: false,
    };
    if model.page == Page::Home {
        mount_map(&mut model);
    }
    model
}

pub fn update(msg: Msg, model: &mut Model, orders: &mut impl Orders<Msg>) {
    match msg {
        Msg::UrlChanged(subs::UrlChanged(url)) => {
            let next = Page::from_url(url);
            if next == model.page {
                return;
            }
            if model.page == Page::Home {
                unmount_map(model);
            }
            model.page = next;
            if model.page == Page::Home {
                mount_map(model);
            }
        }
        Msg::MarkerMoved { kind, position } => {
            model.markers.apply_move(kind, position);
        }
        Msg::Submit => {
            let Some(request) = model.accept_submission() else {
                return;
            };
            set_submit_enabled(false);
            orders.perform_cmd(send_route_request(request));
        }
        Msg::RouteFetched(result) => {
            model.submission = SubmissionState::Idle;
            set_submit_enabled(true);
            match result {
                Ok(route) => model.result = Some(route),
                Err(err) => {
                    // Submission failures leave the panels untouched.
                    web_sys::console::error_1(
                        &format!("[frontend] route request failed: {err}").into(),
                    );
                }
            }
        }
    }
}

fn mount_map(model: &mut Model) {
    // One live map per mounted Home view.
    if model.map_live {
        return;
    }
    init_map();
    model.map_live = true;
}

fn unmount_map(model: &mut Model) {
    if !model.map_live {
        return;
    }
    destroy_map();
    model.map_live = false;
    model.clear_home_state();
}

async fn send_route_request(payload: RouteRequest) -> Msg {
    web_sys::console::debug_1(
        &format!(
            "[frontend] requesting paths start=({:.6},{:.6}) end=({:.6},{:.6})",
            payload.start_lat, payload.start_lon, payload.end_lat, payload.end_lon
        )
        .into(),
    );
    Msg::RouteFetched(fetch_route(payload).await)
}

async fn fetch_route(payload: RouteRequest) -> Result<RouteResult, RequestError> {
    let request = Request::new(api_root())
        .method(Method::Post)
        .json(&payload)
        .map_err(|err| RequestError::BadRequest(format!("{err:?}")))?;
    let raw = request
        .fetch()
        .await
        .map_err(|err| RequestError::Transport(format!("{err:?}")))?;
    let response = raw
        .check_status()
        .map_err(|err| RequestError::Status(format!("{err:?}")))?;
    let body = response
        .text()
        .await
        .map_err(|err| RequestError::Transport(format!("{err:?}")))?;
    decode_route_result(&body)
}

fn decode_route_result(body: &str) -> Result<RouteResult, RequestError> {
    serde_json::from_str(body).map_err(|err| RequestError::MalformedBody(err.to_string()))
}

pub fn view(model: &Model) -> Node<Msg> {
    div![
        C!["app-shell"],
        view_nav(model.page),
        match model.page {
            Page::Home => view_home(model),
            Page::HeatMap => view_heatmap(),
        }
    ]
}

fn view_nav(page: Page) -> Node<Msg> {
    let link = |href: &str, label: &str, active: bool| {
        a![
            C!["nav-link", IF!(active => "active")],
            attrs! { At::Href => href },
            label,
        ]
    };

    nav![
        C!["nav-bar"],
        span![C!["nav-brand"], "Safe Paths"],
        link("/", "Map", page == Page::Home),
        link("/heatmap", "Heat map", page == Page::HeatMap),
    ]
}

fn view_home(model: &Model) -> Node<Msg> {
    div![
        C!["map-page"],
        view_readout(&model.markers),
        view_result(model.result.as_ref()),
    ]
}

fn view_heatmap() -> Node<Msg> {
    div![
        C!["heatmap-page"],
        h2!["Heat map"],
        p!["The incident heat map is not available yet."],
    ]
}

fn view_readout(markers: &MarkerState) -> Node<Msg> {
    let field = |label_text: &str, name: &str, value: Option<f64>| {
        div![
            C!["readout-row"],
            label![attrs! { At::For => name }, label_text],
            input![attrs! {
                At::Type => "text",
                At::Name => name,
                At::Id => name,
                At::ReadOnly => bool_attr(true),
                At::Value => value.map(format_coord).unwrap_or_default(),
            }],
        ]
    };

    form![
        id!("submit_form"),
        C!["dashboard", "overlay"],
        field("Start latitude", "start_lat", markers.start.map(|c| c.lat)),
        field("Start longitude", "start_lon", markers.start.map(|c| c.lon)),
        field("End latitude", "end_lat", markers.end.map(|c| c.lat)),
        field("End longitude", "end_lon", markers.end.map(|c| c.lon)),
    ]
}

fn view_result(result: Option<&RouteResult>) -> Node<Msg> {
    let safest = result.map(|r| r.safest_path_weight).unwrap_or(0.0);
    let shortest = result.map(|r| r.shortest_path_weight).unwrap_or(0.0);

    let previews = match result {
        Some(route) => div![
            C!["route-previews"],
            section![
                C!["route-preview"],
                h4!["Safest path"],
                raw![&route.safest_path_map_html],
            ],
            section![
                C!["route-preview"],
                h4!["Shortest path"],
                raw![&route.shortest_path_map_html],
            ],
        ],
        None => empty![],
    };

    div![
        id!("result"),
        C!["result-panel", "overlay"],
        h3!["Path Information"],
        p![strong!["Safest path weight: "], format_weight(safest)],
        p![strong!["Shortest path weight: "], format_weight(shortest)],
        previews,
    ]
}

fn bool_attr(value: bool) -> AtValue {
    if value {
        AtValue::Some("true".into())
    } else {
        AtValue::Ignored
    }
}

fn format_coord(value: f64) -> String {
    format!("{value:.6}")
}

// Debug formatting keeps the decimal point on whole numbers, so a weight of
// 20.0 in the response body reads back as "20.0" rather than "20".
fn format_weight(value: f64) -> String {
    format!("{value:?}")
}

#[derive(Deserialize)]
struct MarkerMovedPayload {
    kind: MarkerKind,
    lat: f64,
    lon: f64,
}

#[wasm_bindgen(start)]
pub fn start() {
    App::start("app", init, update, view);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    fn home_model() -> Model {
        Model {
            page: Page::Home,
            markers: MarkerState::default(),
            submission: SubmissionState::Idle,
            result: None,
            map_live: true,
        }
    }

    fn sample_result() -> RouteResult {
        RouteResult {
            safest_path_map_html: "<div/>".to_string(),
            shortest_path_map_html: "<div/>".to_string(),
            safest_path_weight: 12.5,
            shortest_path_weight: 20.0,
        }
    }

    #[test]
    fn drag_updates_only_the_dragged_marker() {
        let mut markers = MarkerState::default();
        markers.apply_move(MarkerKind::Start, coord(10.706512, 122.581742));
        markers.apply_move(MarkerKind::End, coord(10.706512, 122.582742));

        markers.apply_move(MarkerKind::Start, coord(10.71, 122.59));

        assert_eq!(markers.start, Some(coord(10.71, 122.59)));
        assert_eq!(markers.end, Some(coord(10.706512, 122.582742)));
    }

    #[test]
    fn no_request_before_both_markers_announced() {
        let mut markers = MarkerState::default();
        assert_eq!(markers.to_request(), None);

        markers.apply_move(MarkerKind::Start, coord(10.7, 122.58));
        assert_eq!(markers.to_request(), None);
    }

    #[test]
    fn request_carries_current_marker_positions() {
        let mut markers = MarkerState::default();
        markers.apply_move(MarkerKind::Start, coord(10.706512, 122.581742));
        markers.apply_move(MarkerKind::End, coord(10.706512, 122.582742));

        let request = markers.to_request().expect("both markers announced");
        assert_eq!(request.start_lat, 10.706512);
        assert_eq!(request.start_lon, 122.581742);
        assert_eq!(request.end_lat, 10.706512);
        assert_eq!(request.end_lon, 122.582742);
    }

    #[test]
    fn request_serializes_to_flat_wire_keys() {
        let request = RouteRequest::from_endpoints(coord(1.5, 2.5), coord(3.5, 4.5));
        let body = serde_json::to_value(&request).expect("serializable");

        assert_eq!(body["start_lat"], 1.5);
        assert_eq!(body["start_lon"], 2.5);
        assert_eq!(body["end_lat"], 3.5);
        assert_eq!(body["end_lon"], 4.5);
        assert_eq!(body.as_object().map(|o| o.len()), Some(4));
    }

    #[test]
    fn decodes_well_formed_response() {
        let body = r#"{
            "safest_path_map_html": "<div/>",
            "shortest_path_map_html": "<div/>",
            "safest_path_weight": 12.5,
            "shortest_path_weight": 20.0
        }"#;

        let result = decode_route_result(body).expect("well-formed body");
        assert_eq!(result.safest_path_weight, 12.5);
        assert_eq!(result.shortest_path_weight, 20.0);
        assert_eq!(result.safest_path_map_html, "<div/>");
        assert_eq!(result.shortest_path_map_html, "<div/>");
    }

    #[test]
    fn missing_field_is_a_malformed_body_error() {
        let body = r#"{"safest_path_weight": 12.5, "shortest_path_weight": 20.0}"#;

        match decode_route_result(body) {
            Err(RequestError::MalformedBody(_)) => {}
            other => panic!("expected MalformedBody, got {other:?}"),
        }
    }

    #[test]
    fn weights_display_as_received() {
        assert_eq!(format_weight(12.5), "12.5");
        assert_eq!(format_weight(20.0), "20.0");
        assert_eq!(format_weight(0.0), "0.0");
    }

    #[test]
    fn marker_moved_payload_parses_event_detail() {
        let payload: MarkerMovedPayload =
            serde_json::from_str(r#"{"kind": "end", "lat": 10.7, "lon": 122.58}"#)
                .expect("valid payload");
        assert_eq!(payload.kind, MarkerKind::End);
        assert_eq!(payload.lat, 10.7);
        assert_eq!(payload.lon, 122.58);
    }

    #[test]
    fn url_slug_selects_page() {
        assert_eq!(Page::from_slug(None), Page::Home);
        assert_eq!(Page::from_slug(Some("heatmap")), Page::HeatMap);
        assert_eq!(Page::from_slug(Some("anything-else")), Page::Home);
    }

    #[test]
    fn pending_submission_blocks_reentry() {
        let mut model = home_model();
        model.markers.apply_move(MarkerKind::Start, coord(10.7, 122.58));
        model.markers.apply_move(MarkerKind::End, coord(10.71, 122.59));

        assert!(model.accept_submission().is_some());
        assert_eq!(model.submission, SubmissionState::Pending);

        // A second activation while the first is in flight is ignored.
        assert_eq!(model.accept_submission(), None);

        // Once the response lands the control accepts submissions again.
        model.submission = SubmissionState::Idle;
        assert!(model.accept_submission().is_some());
    }

    #[test]
    fn submission_refused_until_markers_announced() {
        let mut model = home_model();
        assert_eq!(model.accept_submission(), None);
        assert_eq!(model.submission, SubmissionState::Idle);

        model.markers.apply_move(MarkerKind::Start, coord(10.7, 122.58));
        assert_eq!(model.accept_submission(), None);
        assert_eq!(model.submission, SubmissionState::Idle);
    }

    #[test]
    fn home_unmount_discards_transient_view_state() {
        let mut model = home_model();
        model.markers.apply_move(MarkerKind::Start, coord(10.7, 122.58));
        model.markers.apply_move(MarkerKind::End, coord(10.71, 122.59));
        model.submission = SubmissionState::Pending;
        model.result = Some(sample_result());

        model.clear_home_state();

        // A remounted Home view starts from scratch: no stale weights or
        // previews, no leftover marker positions, submit accepted again
        // once fresh markers announce themselves.
        assert_eq!(model.result, None);
        assert_eq!(model.markers, MarkerState::default());
        assert_eq!(model.submission, SubmissionState::Idle);
    }
}
