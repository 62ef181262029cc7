//! User-facing messages shown by the front end.

pub const SESSION_EXPIRED: &str = "Sua sessão expirou. Faça login novamente.";
pub const ACCESS_DENIED: &str = "Acesso negado. Você não tem permissão para acessar esta página.";
pub const NETWORK_ERROR: &str = "Erro de conexão com o servidor. Verifique sua internet.";
pub const INVALID_LOGIN: &str = "Email ou senha incorretos.";
pub const REQUIRED_FIELDS: &str = "Preencha todos os campos obrigatórios.";
pub const SUBMITTING: &str = "Enviando proposta...";
pub const NEW_PROPOSAL_PROMPT: &str = "Deseja criar uma nova proposta?";
pub const REQUEST_FAILED: &str = "Erro ao processar a solicitação.";
