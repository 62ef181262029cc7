//! End-to-end flows across the Licita crates: CLI wiring, file-backed
//! storage and the HTTP client against an in-process portal.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

use licita_cli::App;
use licita_common::{BrowserStorage, LicitaConfig, ManualClock, Principal, Role};
use licita_proposal::{is_protocol, Attachment, MockProposalBackend, ProposalForm, SubmissionOutcome};
use licita_security::{MockAuthBackend, RecordCategory};

const SUPPLIER_EMAIL: &str = "contato@acme.com.br";
const BUYER_EMAIL: &str = "ana@prefeitura.gov.br";
const PASSWORD: &str = "segredo123";

// ============================================================================
// Fake portal
// ============================================================================

#[derive(Default)]
struct Portal {
    proposals: Mutex<Vec<Value>>,
    authorizations: Mutex<Vec<String>>,
}

fn digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn spawn_portal(portal: Arc<Portal>) -> SocketAddr {
    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .map(|body: Value| {
            let user = match (body["email"].as_str(), body["senha"].as_str()) {
                (Some(SUPPLIER_EMAIL), Some(PASSWORD)) => Some(json!({
                    "id": 7, "nome": "ACME Engenharia", "email": SUPPLIER_EMAIL,
                    "tipo": "fornecedor", "cnpj": "12.345.678/0001-90"
                })),
                (Some(BUYER_EMAIL), Some(PASSWORD)) => Some(json!({
                    "id": 3, "nome": "Ana", "email": BUYER_EMAIL, "tipo": "comprador"
                })),
                _ => None,
            };
            match user {
                Some(user) => warp::reply::with_status(
                    warp::reply::json(&json!({
                        "sucesso": true,
                        "token": format!("tok-{}", user["id"]),
                        "usuario": user
                    })),
                    StatusCode::OK,
                ),
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"sucesso": false, "erro": "Credenciais inválidas"})),
                    StatusCode::UNAUTHORIZED,
                ),
            }
        });

    let logout = warp::path!("api" / "logout")
        .and(warp::post())
        .map(|| warp::reply::json(&json!({"sucesso": true})));

    let verify_state = portal.clone();
    let verify = warp::path!("api" / "verificar-cnpj")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: Value| {
            let proposals = verify_state.proposals.lock();
            let previous = proposals.iter().find(|p| {
                digits(p["dados"]["cnpj"].as_str().unwrap_or_default())
                    == body["cnpj"].as_str().unwrap_or_default()
                    && p["processo"] == body["processo"]
            });
            match previous {
                Some(p) => warp::reply::json(&json!({
                    "duplicado": true,
                    "protocolo": p["protocolo"],
                    "data": p["geradoEm"],
                    "empresa": p["dados"]["razaoSocial"]
                })),
                None => warp::reply::json(&json!({"duplicado": false})),
            }
        });

    let submit_state = portal.clone();
    let submit = warp::path!("api" / "enviar-proposta")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: Value| {
            let protocol = body["protocolo"].clone();
            submit_state.proposals.lock().push(body);
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "sucesso": true,
                    "protocolo": protocol,
                    "anexos": ["tecnica.pdf", "comercial.xlsx"]
                })),
                StatusCode::CREATED,
            )
        });

    let list_state = portal.clone();
    let processes = warp::path!("api" / "processos" / "listar")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .map(move |authorization: Option<String>| {
            if let Some(value) = authorization {
                list_state.authorizations.lock().push(value);
            }
            warp::reply::json(&json!({
                "processos": [
                    {"numero": "CC-1/2024", "objeto": "Escola", "criadoPor": 3,
                     "prazo": "2099-12-31T18:00:00", "status": "ativo"},
                    {"numero": "CC-2/2024", "objeto": "Ponte", "criadoPor": 4,
                     "prazo": "2099-06-30"},
                    {"numero": "CC-0/2019", "objeto": "Praça", "criadoPor": 3,
                     "prazo": "2020-01-01T00:00:00", "status": "encerrado"}
                ]
            }))
        });

    let proposal_state = portal.clone();
    let proposals = warp::path!("api" / "propostas" / "listar")
        .and(warp::get())
        .map(move || {
            let mut all = proposal_state.proposals.lock().clone();
            all.push(json!({
                "protocolo": "PROP-OUTRA", "processo": "CC-2/2024",
                "dados": {"cnpj": "98.765.432/0001-00", "razaoSocial": "Beta Obras"},
                "status": "recebida"
            }));
            warp::reply::json(&json!({"total": all.len(), "propostas": all}))
        });

    let routes = login
        .or(logout)
        .or(verify)
        .or(submit)
        .or(processes)
        .or(proposals);

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn config(dir: &Path, addr: SocketAddr) -> LicitaConfig {
    let mut config = LicitaConfig::default();
    config.api.base_url = format!("http://{}", addr);
    config.api.timeout_secs = 5;
    config.storage.data_dir = dir.to_path_buf();
    config
}

fn form(process: &str) -> ProposalForm {
    let mut form = ProposalForm::for_process(process);
    form.company.legal_name = "ACME Engenharia".to_string();
    form.company.tax_id = "12.345.678/0001-90".to_string();
    form.commercial.overhead_percent = "20".to_string();
    form.commercial.labor = licita_proposal::CostCategory::from_total("1.000,00");
    form.attachments.push(Attachment::new("proposta.pdf", 2048));
    form
}

// ============================================================================
// HTTP flows
// ============================================================================

#[tokio::test]
async fn test_supplier_submits_once_then_is_blocked() {
    let portal = Arc::new(Portal::default());
    let addr = spawn_portal(portal.clone());
    let dir = tempfile::tempdir().unwrap();
    let app = App::open(config(dir.path(), addr)).unwrap();

    app.login(SUPPLIER_EMAIL, PASSWORD).await.unwrap();

    let first = app.submit(&form("CC-1/2024")).await.unwrap();
    let protocol = match &first {
        SubmissionOutcome::Submitted(receipt) => receipt.protocol.clone(),
        other => panic!("expected a submission, got {:?}", other),
    };
    assert!(is_protocol(&protocol));
    assert_eq!(portal.proposals.lock().len(), 1);
    assert_eq!(app.submitter().history().entries().len(), 1);

    let second = app.submit(&form("CC-1/2024")).await.unwrap();
    match second {
        SubmissionOutcome::Duplicate { protocol: previous, .. } => {
            assert_eq!(previous.as_deref(), Some(protocol.as_str()));
        }
        other => panic!("expected a duplicate, got {:?}", other),
    }
    assert_eq!(portal.proposals.lock().len(), 1);

    // A different process is still open to this company
    let other = app.submit(&form("CC-2/2024")).await.unwrap();
    assert!(matches!(other, SubmissionOutcome::Submitted(_)));
}

#[tokio::test]
async fn test_session_survives_reopen_and_token_is_sent() {
    let portal = Arc::new(Portal::default());
    let addr = spawn_portal(portal.clone());
    let dir = tempfile::tempdir().unwrap();

    {
        let app = App::open(config(dir.path(), addr)).unwrap();
        app.login(SUPPLIER_EMAIL, PASSWORD).await.unwrap();
    }

    let app = App::open(config(dir.path(), addr)).unwrap();
    assert!(app.whoami().unwrap().contains("ACME Engenharia"));

    let listing = app.list(&RecordCategory::Processes, None).await.unwrap();
    assert!(listing.contains("CC-1/2024"));
    assert!(listing.contains("CC-2/2024"));
    assert!(!listing.contains("CC-0/2019"));

    assert_eq!(portal.authorizations.lock().as_slice(), ["Bearer tok-7"]);
}

#[tokio::test]
async fn test_buyer_sees_own_processes_and_their_proposals() {
    let portal = Arc::new(Portal::default());
    let addr = spawn_portal(portal.clone());

    let supplier_dir = tempfile::tempdir().unwrap();
    let supplier = App::open(config(supplier_dir.path(), addr)).unwrap();
    supplier.login(SUPPLIER_EMAIL, PASSWORD).await.unwrap();
    supplier.submit(&form("CC-1/2024")).await.unwrap();
    let own = supplier.list(&RecordCategory::Proposals, None).await.unwrap();
    assert!(own.contains("ACME Engenharia"));
    assert!(!own.contains("PROP-OUTRA"));

    let buyer_dir = tempfile::tempdir().unwrap();
    let buyer = App::open(config(buyer_dir.path(), addr)).unwrap();
    buyer.login(BUYER_EMAIL, PASSWORD).await.unwrap();

    let processes = buyer.list(&RecordCategory::Processes, None).await.unwrap();
    assert!(processes.contains("CC-1/2024"));
    assert!(processes.contains("CC-0/2019"));
    assert!(!processes.contains("CC-2/2024"));

    let proposals = buyer.list(&RecordCategory::Proposals, None).await.unwrap();
    assert!(proposals.contains("ACME Engenharia"));
    assert!(!proposals.contains("PROP-OUTRA"));
}

#[tokio::test]
async fn test_rejected_login_leaves_no_session() {
    let addr = spawn_portal(Arc::new(Portal::default()));
    let dir = tempfile::tempdir().unwrap();
    let app = App::open(config(dir.path(), addr)).unwrap();

    let err = app.login(SUPPLIER_EMAIL, "errada").await.unwrap_err();
    assert_eq!(err.to_string(), "Credenciais inválidas");
    assert!(app.whoami().is_err());
}

#[tokio::test]
async fn test_logout_clears_session_and_draft() {
    let addr = spawn_portal(Arc::new(Portal::default()));
    let dir = tempfile::tempdir().unwrap();
    let app = App::open(config(dir.path(), addr)).unwrap();

    app.login(SUPPLIER_EMAIL, PASSWORD).await.unwrap();
    app.save_draft(&form("CC-1/2024")).unwrap();

    let message = app.logout("/portal-propostas.html").await;
    assert!(message.contains("redirect to /"));
    assert!(app.show_draft().unwrap().is_none());
    assert!(app.whoami().is_err());

    let reopened = App::open(config(dir.path(), addr)).unwrap();
    assert!(reopened.whoami().is_err());
    let log = reopened.activity(10);
    assert!(log.contains("login"));
    assert!(log.contains("logout"));
}

// ============================================================================
// Offline flows
// ============================================================================

#[tokio::test]
async fn test_draft_recovered_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let open = || {
        App::with_parts(
            LicitaConfig::default(),
            BrowserStorage::open_dir(dir.path()).unwrap(),
            clock.clone(),
            Arc::new(MockAuthBackend::new().with_account(
                SUPPLIER_EMAIL,
                PASSWORD,
                Principal::new("7", "ACME Engenharia", Role::Supplier)
                    .with_tax_id("12.345.678/0001-90"),
            )),
            Arc::new(MockProposalBackend::new()),
            None,
        )
    };

    open().save_draft(&form("CC-1/2024")).unwrap();

    let restarted = open();
    let draft = restarted.show_draft().unwrap().unwrap();
    assert!(draft.contains("CC-1/2024"));
    assert!(draft.contains("ACME Engenharia"));
}

#[tokio::test]
async fn test_offline_submission_keeps_draft() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::with_parts(
        LicitaConfig::default(),
        BrowserStorage::open_dir(dir.path()).unwrap(),
        Arc::new(ManualClock::new(chrono::Utc::now())),
        Arc::new(MockAuthBackend::new().with_account(
            SUPPLIER_EMAIL,
            PASSWORD,
            Principal::new("7", "ACME Engenharia", Role::Supplier),
        )),
        Arc::new(MockProposalBackend::new().offline()),
        None,
    );

    app.login(SUPPLIER_EMAIL, PASSWORD).await.unwrap();
    app.save_draft(&form("CC-1/2024")).unwrap();

    let err = app.submit(&form("CC-1/2024")).await.unwrap_err();
    assert_eq!(err.to_string(), licita_common::messages::NETWORK_ERROR);
    assert!(app.show_draft().unwrap().is_some());
    assert!(app.submitter().history().entries().is_empty());
}
