use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use medidesk_client_core::{ApiClient, ClientConfig, ClientCoreError, SecretString};
use medidesk_domain::{CaptchaKeys, Identity, LoginRole, NewDoctor, Role, UserId};
use tokio::net::TcpListener;

static LOG_INIT: OnceLock<()> = OnceLock::new();

fn init_test_logging() {
	LOG_INIT.get_or_init(|| {
		if std::env::var_os("MEDIDESK_TEST_LOG").is_none() {
			return;
		}

		let _ = tracing_subscriber::fmt()
			.with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
			.with_target(false)
			.try_init();
	});
}

#[derive(Debug, Clone)]
struct Recorded {
	method: String,
	path: String,
	authorization: Option<String>,
	content_type: Option<String>,
	body: Vec<u8>,
}

#[derive(Clone, Default)]
struct FakeBackend {
	routes: Arc<HashMap<(String, String), (u16, String)>>,
	requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeBackend {
	fn new(routes: &[(&str, &str, u16, serde_json::Value)]) -> Self {
		let routes = routes
			.iter()
			.map(|(m, p, s, b)| ((m.to_string(), p.to_string()), (*s, b.to_string())))
			.collect();
		Self {
			routes: Arc::new(routes),
			requests: Arc::default(),
		}
	}

	fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().expect("requests lock").clone()
	}
}

async fn handle(req: Request<Incoming>, backend: FakeBackend) -> Result<Response<Full<Bytes>>, hyper::Error> {
	let method = req.method().to_string();
	let path = req.uri().path().to_string();
	let header = |name: &str| {
		req.headers()
			.get(name)
			.and_then(|v| v.to_str().ok())
			.map(|v| v.to_string())
	};
	let authorization = header("authorization");
	let content_type = header("content-type");
	let body = req.into_body().collect().await?.to_bytes().to_vec();

	backend.requests.lock().expect("requests lock").push(Recorded {
		method: method.clone(),
		path: path.clone(),
		authorization,
		content_type,
		body,
	});

	let (status, body) = backend
		.routes
		.get(&(method, path))
		.cloned()
		.unwrap_or((404, r#"{"message":"no route"}"#.to_string()));

	Ok(Response::builder()
		.status(StatusCode::from_u16(status).expect("status"))
		.header("content-type", "application/json")
		.body(Full::new(Bytes::from(body)))
		.expect("response"))
}

async fn spawn_backend(backend: FakeBackend) -> SocketAddr {
	init_test_logging();
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
	let addr = listener.local_addr().expect("local addr");
	tokio::spawn(async move {
		loop {
			let Ok((stream, _)) = listener.accept().await else {
				return;
			};
			let backend = backend.clone();
			tokio::spawn(async move {
				let service = service_fn(move |req| handle(req, backend.clone()));
				let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
			});
		}
	});
	addr
}

fn client_for(addr: SocketAddr) -> ApiClient {
	let cfg = ClientConfig::from_backend_url(&format!("http://{addr}")).expect("config");
	ApiClient::new(cfg).expect("client")
}

fn token() -> SecretString {
	SecretString::new("tok-1")
}

fn uid(id: &str) -> UserId {
	UserId::new(id).expect("user id")
}

#[tokio::test]
async fn login_returns_token_and_identity() {
	let backend = FakeBackend::new(&[(
		"POST",
		"/api/v1/doctor/login",
		200,
		serde_json::json!({"status": "success", "token": "tok-9", "data": {"_id": "d1", "name": "Dr. Rao", "email": "rao@example.com", "role": "doctor"}}),
	)]);
	let addr = spawn_backend(backend.clone()).await;

	let resp = client_for(addr)
		.login(LoginRole::Doctor, "rao@example.com", "pw")
		.await
		.expect("login");
	assert_eq!(resp.token.expose(), "tok-9");
	assert_eq!(resp.identity.id.as_str(), "d1");
	assert_eq!(resp.identity.role, Role::Operator);

	let sent: serde_json::Value = serde_json::from_slice(&backend.requests()[0].body).expect("json body");
	assert_eq!(sent, serde_json::json!({"email": "rao@example.com", "password": "pw"}));
}

#[tokio::test]
async fn failed_status_flag_is_a_validation_error() {
	let backend = FakeBackend::new(&[(
		"POST",
		"/api/v1/admin/login",
		200,
		serde_json::json!({"status": "fail", "message": "Invalid credentials"}),
	)]);
	let addr = spawn_backend(backend).await;

	let err = client_for(addr)
		.login(LoginRole::Admin, "a@example.com", "bad")
		.await
		.unwrap_err();
	match err {
		ClientCoreError::Validation(msg) => assert!(msg.contains("Invalid credentials")),
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn unauthorized_maps_to_auth_and_sends_bearer() {
	let backend = FakeBackend::new(&[(
		"GET",
		"/api/v1/admin/getAdmin",
		401,
		serde_json::json!({"message": "jwt expired"}),
	)]);
	let addr = spawn_backend(backend.clone()).await;

	let err = client_for(addr).current_admin(&token()).await.unwrap_err();
	assert!(err.is_auth());
	assert_eq!(backend.requests()[0].authorization.as_deref(), Some("Bearer tok-1"));
}

#[tokio::test]
async fn current_admin_ignores_staff_role_string() {
	let backend = FakeBackend::new(&[(
		"GET",
		"/api/v1/admin/getAdmin",
		200,
		serde_json::json!({"status": "success", "data": {"_id": "a1", "name": "Root", "role": "superadmin"}}),
	)]);
	let addr = spawn_backend(backend).await;

	let me = client_for(addr).current_admin(&token()).await.expect("admin");
	assert_eq!(me, Identity::operator(uid("a1")));
}

#[tokio::test]
async fn doctors_filter_admins_and_treat_404_as_empty() {
	let backend = FakeBackend::new(&[(
		"GET",
		"/api/v1/admin/doctors",
		200,
		serde_json::json!({"status": "success", "data": [
			{"_id": "d1", "name": "Dr. Rao", "role": "doctor", "isAvailable": true},
			{"_id": "a1", "name": "Root", "role": "admin"},
		]}),
	)]);
	let addr = spawn_backend(backend).await;
	let doctors = client_for(addr).list_doctors(&token()).await.expect("doctors");
	assert_eq!(doctors.len(), 1);
	assert_eq!(doctors[0].id, "d1");

	let empty = spawn_backend(FakeBackend::new(&[])).await;
	assert!(client_for(empty).list_doctors(&token()).await.expect("doctors").is_empty());
}

#[tokio::test]
async fn appointments_require_success_flag() {
	let backend = FakeBackend::new(&[(
		"GET",
		"/api/v1/admin/getAllAppointments",
		200,
		serde_json::json!({"success": true, "data": [
			{"_id": "ap1", "Slotdate": "10 3_2025", "timeSlot": "10:30AM",
			 "doctor": {"name": "Dr. Rao"}, "user": {"name": "Asha", "phoneno": "555"}, "amount": 40},
		]}),
	)]);
	let addr = spawn_backend(backend).await;
	let appointments = client_for(addr).list_appointments(&token()).await.expect("appointments");
	assert_eq!(appointments[0].time_slot, "10:30AM");
	assert_eq!(appointments[0].user.phone.as_deref(), Some("555"));

	let failing = spawn_backend(FakeBackend::new(&[(
		"GET",
		"/api/v1/admin/getAllAppointments",
		200,
		serde_json::json!({"success": false, "message": "nope"}),
	)]))
	.await;
	let err = client_for(failing).list_appointments(&token()).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Validation(_)));
}

#[tokio::test]
async fn delete_and_availability_hit_expected_paths() {
	let backend = FakeBackend::new(&[
		(
			"DELETE",
			"/api/v1/admin/deleteAppointmentAdmin/ap1",
			200,
			serde_json::json!({"status": "success"}),
		),
		(
			"POST",
			"/api/v1/admin/doctors/changeAvailability",
			200,
			serde_json::json!({"status": "success"}),
		),
	]);
	let addr = spawn_backend(backend.clone()).await;
	let client = client_for(addr);

	client.delete_appointment(&token(), "ap1").await.expect("delete");
	client.change_doctor_availability(&token(), "d1").await.expect("toggle");

	let requests = backend.requests();
	assert_eq!(requests[0].method, "DELETE");
	let sent: serde_json::Value = serde_json::from_slice(&requests[1].body).expect("json body");
	assert_eq!(sent, serde_json::json!({"docId": "d1"}));
}

#[tokio::test]
async fn add_doctor_validates_before_sending_and_posts_multipart() {
	let backend = FakeBackend::new(&[(
		"POST",
		"/api/v1/admin/add-doctor",
		200,
		serde_json::json!({"status": "success"}),
	)]);
	let addr = spawn_backend(backend.clone()).await;
	let client = client_for(addr);

	let mut doctor = NewDoctor {
		name: "Dr. Rao".to_string(),
		email: "rao@example.com".to_string(),
		password: "pw".to_string(),
		speciality: "ENT".to_string(),
		degree: "MBBS".to_string(),
		experience: "4 Years".to_string(),
		fee: 40.0,
		address: "Main St".to_string(),
		..NewDoctor::default()
	};
	let err = client.add_doctor(&token(), &doctor).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Validation(_)));
	assert!(backend.requests().is_empty());

	doctor.image = vec![0x89, b'P', b'N', b'G'];
	doctor.image_file_name = "rao.png".to_string();
	client.add_doctor(&token(), &doctor).await.expect("add doctor");

	let requests = backend.requests();
	let req = &requests[0];
	assert!(req.content_type.as_deref().unwrap_or_default().starts_with("multipart/form-data"));
	let body = String::from_utf8_lossy(&req.body);
	assert!(body.contains("name=\"role\"\r\n\r\ndoctor"));
	assert!(body.contains("filename=\"rao.png\""));
}

#[tokio::test]
async fn dashboard_and_captcha() {
	let backend = FakeBackend::new(&[
		(
			"GET",
			"/api/v1/admin/dashboard-admin",
			200,
			serde_json::json!({"status": "success", "data": {"doctors": 3, "appointments": 7, "users": 12, "latestAppointments": []}}),
		),
		("POST", "/api/v1/UpdateCaptcha", 200, serde_json::json!({"status": "success"})),
	]);
	let addr = spawn_backend(backend.clone()).await;
	let client = client_for(addr);

	let summary = client.dashboard(&token()).await.expect("dashboard");
	assert_eq!((summary.doctors, summary.appointments, summary.users), (3, 7, 12));

	let keys = CaptchaKeys {
		site_key: "site".to_string(),
		secret_key: "secret".to_string(),
	};
	client.update_captcha(&token(), &keys).await.expect("captcha");
	let sent: serde_json::Value = serde_json::from_slice(&backend.requests()[1].body).expect("json body");
	assert_eq!(sent, serde_json::json!({"siteKey": "site", "secretKey": "secret"}));
}

#[tokio::test]
async fn chat_collaborators_round_trip() {
	let backend = FakeBackend::new(&[
		(
			"GET",
			"/api/v1/message/users",
			200,
			serde_json::json!({"status": "success",
				"users": [{"_id": "u2", "name": "Bo"}, {"_id": "u1", "name": "Asha", "image": "a.png"}],
				"unseenMessages": {"u1": 2, "u2": 0}}),
		),
		(
			"GET",
			"/api/v1/message/admin/u1",
			200,
			serde_json::json!({"status": "success", "messages": [
				{"_id": "m1", "sender": "user", "content": "hello", "timestamp": "t1"},
			]}),
		),
		(
			"POST",
			"/api/v1/message/send",
			200,
			serde_json::json!({"status": "success", "message": {"_id": "m2", "sender": "admin", "content": "hi", "timestamp": "t2"}}),
		),
		("GET", "/api/v1/message/mark/u1", 200, serde_json::json!({"status": "success"})),
	]);
	let addr = spawn_backend(backend.clone()).await;
	let client = client_for(addr);

	let directory = client.fetch_directory(&token()).await.expect("directory");
	let order: Vec<&str> = directory.counterparts.iter().map(|c| c.id.as_str()).collect();
	assert_eq!(order, vec!["u2", "u1"]);
	assert_eq!(directory.unseen.get(&uid("u1")), Some(&2));
	assert!(!directory.unseen.contains_key(&uid("u2")));

	let history = client.fetch_history(&token(), &uid("u1")).await.expect("history");
	assert_eq!(history.len(), 1);

	let me = Identity::operator(uid("a1"));
	let sent = client.send_message(&token(), &me, &uid("u1"), "hi").await.expect("send");
	assert_eq!(sent.id.as_str(), "m2");
	assert!(sent.is_from_operator());

	client.mark_seen(&token(), &uid("u1")).await.expect("mark seen");

	let send_body: serde_json::Value = serde_json::from_slice(&backend.requests()[2].body).expect("json body");
	assert_eq!(
		send_body,
		serde_json::json!({"senderRole": "admin", "senderId": "a1", "content": "hi", "receiverId": "u1"})
	);
}

#[tokio::test]
async fn history_404_is_not_found_and_empty_send_makes_no_request() {
	let backend = FakeBackend::new(&[]);
	let addr = spawn_backend(backend.clone()).await;
	let client = client_for(addr);

	let err = client.fetch_history(&token(), &uid("ghost")).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::NotFound(_)));

	let me = Identity::operator(uid("a1"));
	let err = client.send_message(&token(), &me, &uid("u1"), "   ").await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Validation(_)));
	assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
	let addr = listener.local_addr().expect("local addr");
	drop(listener);

	let err = client_for(addr).dashboard(&token()).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Network(_)));
}
