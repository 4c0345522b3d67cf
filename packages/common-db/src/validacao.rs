//! Validadores de campos usados pelos modelos
//!
//! As funções seguem a assinatura esperada por `#[validate(custom = "...")]`.

use std::borrow::Cow;

use validator::ValidationError;

use crate::dinheiro::Centavos;

fn erro(codigo: &'static str, mensagem: &'static str) -> ValidationError {
    let mut erro = ValidationError::new(codigo);
    erro.message = Some(Cow::Borrowed(mensagem));
    erro
}

/// Soma ponderada (pesos decrescentes até 2) multiplicada por 10, módulo 11
fn residuo(digitos: &[u32], peso_inicial: u32) -> u32 {
    let soma: u32 = digitos
        .iter()
        .zip((2..=peso_inicial).rev())
        .map(|(d, peso)| d * peso)
        .sum();
    (soma * 10) % 11
}

/// Calcula um dígito verificador do CPF a partir do peso inicial
fn digito_verificador(digitos: &[u32], peso_inicial: u32) -> u32 {
    match residuo(digitos, peso_inicial) {
        10 => 0,
        d => d,
    }
}

/// Verifica os dígitos verificadores de um CPF sem pontuação
pub fn cpf_valido(cpf: &str) -> bool {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digitos: Vec<u32> = cpf.bytes().map(|b| u32::from(b - b'0')).collect();
    if digitos.iter().all(|&d| d == digitos[0]) {
        return false;
    }
    let primeiro = digito_verificador(&digitos[..9], 10);
    let segundo = digito_verificador(&digitos[..10], 11);
    digitos[9] == primeiro && digitos[10] == segundo
}

pub fn validar_cpf(cpf: &str) -> Result<(), ValidationError> {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return Err(erro(
            "cpf_formato",
            "CPF deve ter exatamente 11 dígitos numéricos.",
        ));
    }
    if cpf_valido(cpf) {
        Ok(())
    } else {
        Err(erro("cpf", "CPF inválido."))
    }
}

/// Telefone com DDD, somente dígitos (10 ou 11)
pub fn validar_telefone(telefone: &str) -> Result<(), ValidationError> {
    let valido = (10..=11).contains(&telefone.len()) && telefone.bytes().all(|b| b.is_ascii_digit());
    if valido {
        Ok(())
    } else {
        Err(erro(
            "telefone",
            "O telefone deve conter 10 ou 11 dígitos numéricos. Exemplo: 31988553344",
        ))
    }
}

pub fn validar_valor_positivo(valor: &Centavos) -> Result<(), ValidationError> {
    if valor.is_positive() {
        Ok(())
    } else {
        Err(erro("valor_positivo", "O valor da consulta deve ser positivo."))
    }
}

pub fn validar_valor_nao_negativo(valor: &Centavos) -> Result<(), ValidationError> {
    if valor.0 >= 0 {
        Ok(())
    } else {
        Err(erro("valor_negativo", "O valor pago não pode ser negativo."))
    }
}

/// Notas permitidas na avaliação de seleção
pub const NOTAS_SELECAO: [i64; 7] = [-9, -3, -1, 0, 1, 3, 9];

pub fn validar_nota_selecao(nota: i64) -> Result<(), ValidationError> {
    if NOTAS_SELECAO.contains(&nota) {
        Ok(())
    } else {
        Err(erro(
            "nota_selecao",
            "Nota deve ser um dos valores -9, -3, -1, 0, 1, 3 ou 9.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const VALIDOS: [&str; 4] = ["52998224725", "11144477735", "12345678909", "39053344705"];

    #[test]
    fn aceita_cpfs_validos() {
        for cpf in VALIDOS {
            assert!(validar_cpf(cpf).is_ok(), "{} deveria ser válido", cpf);
        }
    }

    #[test]
    fn rejeita_formato_e_repeticoes() {
        assert!(validar_cpf("5299822472").is_err());
        assert!(validar_cpf("529982247250").is_err());
        assert!(validar_cpf("529.982.247-25").is_err());
        assert!(validar_cpf("00000000000").is_err());
        assert!(validar_cpf("99999999999").is_err());

        let erro = validar_cpf("123").unwrap_err();
        assert_eq!(erro.code, "cpf_formato");
    }

    #[test]
    fn rejeita_digito_verificador_errado() {
        let erro = validar_cpf("52998224724").unwrap_err();
        assert_eq!(erro.code, "cpf");
    }

    #[test]
    fn telefone_aceita_10_ou_11_digitos() {
        assert!(validar_telefone("3133334444").is_ok());
        assert!(validar_telefone("31988553344").is_ok());
        assert!(validar_telefone("+5531988553344").is_err());
        assert!(validar_telefone("(31) 98855-3344").is_err());
        assert!(validar_telefone("319885").is_err());
    }

    #[test]
    fn valores_monetarios() {
        assert!(validar_valor_positivo(&Centavos(1)).is_ok());
        assert!(validar_valor_positivo(&Centavos(0)).is_err());
        assert!(validar_valor_nao_negativo(&Centavos(0)).is_ok());
        assert!(validar_valor_nao_negativo(&Centavos(-1)).is_err());
    }

    fn com_digitos_verificadores(base: &[u32]) -> String {
        let mut digitos = base.to_vec();
        digitos.push(digito_verificador(&digitos, 10));
        digitos.push(digito_verificador(&digitos, 11));
        digitos.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect()
    }

    proptest! {
        #[test]
        fn cpf_gerado_e_aceito(base in proptest::collection::vec(0u32..10, 9)) {
            prop_assume!(base.iter().any(|&d| d != base[0]));
            let cpf = com_digitos_verificadores(&base);
            prop_assert!(cpf_valido(&cpf));
        }

        #[test]
        fn mutacao_de_um_digito_e_rejeitada(
            base in proptest::collection::vec(0u32..10, 9),
            posicao in 0usize..11,
            delta in 1u32..10,
        ) {
            // resíduos 0 e 10 produzem o mesmo dígito 0
            prop_assume!(residuo(&base, 10) % 10 != 0);
            let cpf = com_digitos_verificadores(&base);
            let mut digitos: Vec<u32> = cpf.chars().map(|c| c.to_digit(10).unwrap()).collect();
            digitos[posicao] = (digitos[posicao] + delta) % 10;
            let mutado: String = digitos.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();
            prop_assert!(!cpf_valido(&mutado));
        }
    }
}
