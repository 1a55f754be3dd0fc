//! 거래소 로컬 코드와 글로벌 코드 간 양방향 매핑.
//!
//! 매핑 규칙:
//! 1. 설정의 이름 변경 테이블에 있으면 그 코드를 사용합니다 (예: 바이낸스 `BCC` -> `BCH`).
//! 2. 통화 사전에 등록된 로컬 코드는 그대로 글로벌 코드가 됩니다.
//! 3. 둘 다 아니면 아직 해석할 수 없습니다 (`None`).
//!
//! 등록되지 않은 코드를 그대로 글로벌 코드로 쓰는 항등 대체는 하지 않습니다.
//! 통화 사전이 도착하기 전의 마켓은 로컬 코드를 임시 키로 쓰고,
//! 사전이 등록된 뒤에야 글로벌 키로 옮겨집니다 ([`crate::MarketRegistry`] 참고).
//!
//! 한 번 등록된 매핑은 [`CodeMapper::reconfigure`] 전까지 바뀌지 않습니다.

use std::collections::HashMap;

/// 로컬/글로벌 코드 매퍼.
#[derive(Debug, Clone, Default)]
pub struct CodeMapper {
    /// 로컬 -> 글로벌 이름 변경
    renames: HashMap<String, String>,
    /// 등록된 로컬 -> 글로벌
    local_to_global: HashMap<String, String>,
    /// 등록된 글로벌 -> 로컬
    global_to_local: HashMap<String, String>,
}

impl CodeMapper {
    /// 이름 변경 테이블로 매퍼를 생성합니다.
    pub fn new(renames: HashMap<String, String>) -> Self {
        Self {
            renames,
            ..Default::default()
        }
    }

    /// 로컬 코드를 글로벌 코드로 해석합니다.
    ///
    /// 이름 변경 대상도 아니고 등록되지도 않은 코드는 `None`입니다.
    pub fn resolve_global(&self, local_code: &str) -> Option<String> {
        if let Some(global) = self.local_to_global.get(local_code) {
            return Some(global.clone());
        }
        self.renames.get(local_code).cloned()
    }

    /// 글로벌 코드를 로컬 코드로 해석합니다.
    pub fn resolve_local(&self, global_code: &str) -> Option<String> {
        if let Some(local) = self.global_to_local.get(global_code) {
            return Some(local.clone());
        }
        self.renames
            .iter()
            .find(|(_, global)| global.as_str() == global_code)
            .map(|(local, _)| local.clone())
    }

    /// 통화 사전에서 확인된 로컬 코드를 등록하고 글로벌 코드를 반환합니다.
    ///
    /// 이미 등록된 코드는 기존 매핑을 그대로 반환합니다.
    pub fn register(&mut self, local_code: &str) -> String {
        if let Some(global) = self.local_to_global.get(local_code) {
            return global.clone();
        }
        let global = self
            .renames
            .get(local_code)
            .cloned()
            .unwrap_or_else(|| local_code.to_string());
        self.local_to_global
            .insert(local_code.to_string(), global.clone());
        self.global_to_local
            .entry(global.clone())
            .or_insert_with(|| local_code.to_string());
        global
    }

    /// 등록 여부를 확인합니다.
    pub fn is_registered(&self, local_code: &str) -> bool {
        self.local_to_global.contains_key(local_code)
    }

    /// 이름 변경 테이블을 교체하고 등록된 코드를 다시 매핑합니다.
    pub fn reconfigure(&mut self, renames: HashMap<String, String>) {
        let registered: Vec<String> = self.local_to_global.keys().cloned().collect();
        self.renames = renames;
        self.local_to_global.clear();
        self.global_to_local.clear();
        for local in registered {
            self.register(&local);
        }
    }

    /// 등록된 (로컬, 글로벌) 쌍을 순회합니다.
    pub fn registered(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local_to_global
            .iter()
            .map(|(local, global)| (local.as_str(), global.as_str()))
    }

    /// 등록된 코드 수.
    pub fn len(&self) -> usize {
        self.local_to_global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local_to_global.is_empty()
    }
}
