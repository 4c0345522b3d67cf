//! Valores monetários em centavos
//!
//! O banco guarda todos os valores como inteiros (centavos). Na API eles
//! aparecem como texto decimal com duas casas ("150.00").

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Quantia em centavos de real
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Centavos(pub i64);

impl Centavos {
    pub const ZERO: Centavos = Centavos(0);

    pub fn from_reais(reais: i64) -> Self {
        Centavos(reais * 100)
    }

    /// Arredonda um valor em reais para o centavo mais próximo
    pub fn from_f64(reais: f64) -> Self {
        Centavos((reais * 100.0).round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parte inteira em reais (trunca os centavos)
    pub fn reais(self) -> i64 {
        self.0 / 100
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn abs(self) -> Self {
        Centavos(self.0.abs())
    }

    /// Divide o valor em `partes` iguais, arredondando ao centavo
    pub fn dividir(self, partes: u32) -> Centavos {
        if partes == 0 {
            return Centavos::ZERO;
        }
        let partes = i64::from(partes);
        let sinal = if self.0 < 0 { -1 } else { 1 };
        let total = self.0.abs();
        Centavos(sinal * ((2 * total + partes) / (2 * partes)))
    }

    /// Interpreta "150", "150.5", "150,50" ou "-3.20"
    pub fn parse(texto: &str) -> Option<Centavos> {
        let texto = texto.trim().replace(',', ".");
        if texto.is_empty() {
            return None;
        }
        let (negativo, corpo) = match texto.strip_prefix('-') {
            Some(resto) => (true, resto),
            None => (false, texto.as_str()),
        };
        let (inteiro, fracao) = match corpo.split_once('.') {
            Some((i, f)) => (i, f),
            None => (corpo, ""),
        };
        if inteiro.is_empty() && fracao.is_empty() {
            return None;
        }
        if fracao.len() > 2
            || !inteiro.chars().all(|c| c.is_ascii_digit())
            || !fracao.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let reais: i64 = if inteiro.is_empty() { 0 } else { inteiro.parse().ok()? };
        let centavos: i64 = match fracao.len() {
            0 => 0,
            1 => fracao.parse::<i64>().ok()? * 10,
            _ => fracao.parse().ok()?,
        };
        let valor = reais.checked_mul(100)?.checked_add(centavos)?;
        Some(Centavos(if negativo { -valor } else { valor }))
    }

    /// Formato brasileiro com separador de milhar: "1.234,56"
    pub fn formatar_br(self) -> String {
        let negativo = self.0 < 0;
        let total = self.0.unsigned_abs();
        let reais = (total / 100).to_string();
        let mut agrupado = String::with_capacity(reais.len() + reais.len() / 3);
        for (i, c) in reais.chars().enumerate() {
            if i > 0 && (reais.len() - i) % 3 == 0 {
                agrupado.push('.');
            }
            agrupado.push(c);
        }
        format!(
            "{}{},{:02}",
            if negativo { "-" } else { "" },
            agrupado,
            total % 100
        )
    }
}

impl std::fmt::Display for Centavos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinal = if self.0 < 0 { "-" } else { "" };
        let total = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sinal, total / 100, total % 100)
    }
}

impl std::ops::Add for Centavos {
    type Output = Centavos;

    fn add(self, outro: Centavos) -> Centavos {
        Centavos(self.0 + outro.0)
    }
}

impl std::ops::Sub for Centavos {
    type Output = Centavos;

    fn sub(self, outro: Centavos) -> Centavos {
        Centavos(self.0 - outro.0)
    }
}

impl std::iter::Sum for Centavos {
    fn sum<I: Iterator<Item = Centavos>>(iter: I) -> Centavos {
        Centavos(iter.map(|c| c.0).sum())
    }
}

impl Serialize for Centavos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct CentavosVisitor;

impl<'de> Visitor<'de> for CentavosVisitor {
    type Value = Centavos;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("um valor monetário como \"150.00\" ou 150.0")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Centavos, E> {
        Centavos::parse(v).ok_or_else(|| E::custom(format!("valor monetário inválido: {}", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Centavos, E> {
        v.checked_mul(100)
            .map(Centavos)
            .ok_or_else(|| E::custom("valor monetário fora do intervalo"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Centavos, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("valor monetário fora do intervalo"))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Centavos, E> {
        if !v.is_finite() {
            return Err(E::custom("valor monetário inválido"));
        }
        Ok(Centavos::from_f64(v))
    }
}

impl<'de> Deserialize<'de> for Centavos {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Centavos, D::Error> {
        deserializer.deserialize_any(CentavosVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aceita_formatos_comuns() {
        assert_eq!(Centavos::parse("150"), Some(Centavos(15000)));
        assert_eq!(Centavos::parse("150.5"), Some(Centavos(15050)));
        assert_eq!(Centavos::parse("150,55"), Some(Centavos(15055)));
        assert_eq!(Centavos::parse("-3.20"), Some(Centavos(-320)));
        assert_eq!(Centavos::parse(""), None);
        assert_eq!(Centavos::parse("1.234"), None);
        assert_eq!(Centavos::parse("abc"), None);
    }

    #[test]
    fn formata_no_padrao_brasileiro() {
        assert_eq!(Centavos(123456).formatar_br(), "1.234,56");
        assert_eq!(Centavos(15000).formatar_br(), "150,00");
        assert_eq!(Centavos(100000000).formatar_br(), "1.000.000,00");
        assert_eq!(Centavos(-5).formatar_br(), "-0,05");
        assert_eq!(Centavos(15000).to_string(), "150.00");
    }

    #[test]
    fn divide_pix_entre_sessoes() {
        assert_eq!(Centavos(30000).dividir(2), Centavos(15000));
        assert_eq!(Centavos(10000).dividir(3), Centavos(3333));
        assert_eq!(Centavos(20000).dividir(3), Centavos(6667));
        assert_eq!(Centavos(100).dividir(0), Centavos::ZERO);
    }

    #[test]
    fn serde_usa_texto_decimal() {
        let json = serde_json::to_string(&Centavos(15000)).unwrap();
        assert_eq!(json, "\"150.00\"");

        let de_texto: Centavos = serde_json::from_str("\"99.90\"").unwrap();
        let de_numero: Centavos = serde_json::from_str("99.9").unwrap();
        let de_inteiro: Centavos = serde_json::from_str("99").unwrap();
        assert_eq!(de_texto, Centavos(9990));
        assert_eq!(de_numero, Centavos(9990));
        assert_eq!(de_inteiro, Centavos(9900));
    }
}
