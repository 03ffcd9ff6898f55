//! Canonical column names used once legacy headers are classified.

pub const CPF: &str = "cpf";
pub const NOME: &str = "nome";
pub const EMAIL: &str = "email";
pub const TELEFONE: &str = "telefone";
pub const CELULAR: &str = "celular";
pub const DATA_NASCIMENTO: &str = "data_nascimento";
pub const DATA_CADASTRO: &str = "data_cadastro";
pub const COMO_CONHECEU: &str = "como_conheceu";
pub const LOJA: &str = "loja";
pub const LOJA_ID: &str = "loja_id";
pub const CANAL_ID: &str = "canal_id";
pub const NUMERO: &str = "numero";
pub const DATA: &str = "data";
pub const VALOR_TOTAL: &str = "valor_total";
pub const VENDEDOR: &str = "vendedor";
pub const TIPO: &str = "tipo";

// Provenance columns added by the loader
pub const ARQUIVO: &str = "_arquivo";
pub const LINHA: &str = "_linha";
pub const LOJA_ORIGEM: &str = "_loja";
pub const DDD_PADRAO: &str = "_ddd";

pub const CANONICAL: &[&str] = &[
    CPF,
    NOME,
    EMAIL,
    TELEFONE,
    CELULAR,
    DATA_NASCIMENTO,
    DATA_CADASTRO,
    COMO_CONHECEU,
    LOJA,
    LOJA_ID,
    NUMERO,
    DATA,
    VALOR_TOTAL,
    VENDEDOR,
];

pub fn is_provenance(name: &str) -> bool {
    name.starts_with('_') || name == TIPO
}
