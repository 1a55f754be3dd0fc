//! 정규화된 통화/마켓 테이블.
//!
//! 레지스트리는 어댑터 하나가 소유하며, 모든 테이블은 하나의 `RwLock` 아래에 있습니다.
//! 마켓 레코드 병합과 활성 집합 갱신은 같은 쓰기 잠금 안에서 수행되므로
//! 읽는 쪽은 레코드의 `is_active`/`is_restricted`와 어긋난 활성 집합을 볼 수 없습니다.
//!
//! 코드가 아직 해석되지 않은 마켓은 로컬 코드를 임시 키로 사용해 보관하고,
//! 통화 정의가 들어와 해석되면 글로벌 키로 옮깁니다.

use crate::code_map::CodeMapper;
use crate::domain::{Currency, CurrencyFields, Market, MarketFields, MarketKey, MarketUpdate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// 네이티브 심볼 -> 로컬/글로벌 코드 매핑.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMapping {
    pub local_base: String,
    pub local_curr: String,
    pub global_base: Option<String>,
    pub global_curr: Option<String>,
}

impl SymbolMapping {
    fn resolve(codes: &CodeMapper, local_base: &str, local_curr: &str) -> Self {
        Self {
            local_base: local_base.to_string(),
            local_curr: local_curr.to_string(),
            global_base: codes.resolve_global(local_base),
            global_curr: codes.resolve_global(local_curr),
        }
    }

    /// 양쪽 코드가 모두 글로벌 코드로 해석되었는지 확인합니다.
    pub fn is_resolved(&self) -> bool {
        self.global_base.is_some() && self.global_curr.is_some()
    }

    /// 마켓 테이블 키. 해석되지 않은 쪽은 로컬 코드를 사용합니다.
    pub fn key(&self) -> MarketKey {
        MarketKey::new(
            self.global_base
                .clone()
                .unwrap_or_else(|| self.local_base.clone()),
            self.global_curr
                .clone()
                .unwrap_or_else(|| self.local_curr.clone()),
        )
    }
}

/// `update_market` 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 글로벌 키로 저장됨
    Stored(MarketKey),
    /// 코드가 해석되지 않아 임시 키로 저장됨
    Placeholder(MarketKey),
    /// 로컬 코드 없이 처음 보는 심볼 (무시됨)
    UnknownSymbol,
}

impl UpdateOutcome {
    /// 레코드가 저장된 키.
    pub fn key(&self) -> Option<&MarketKey> {
        match self {
            UpdateOutcome::Stored(key) | UpdateOutcome::Placeholder(key) => Some(key),
            UpdateOutcome::UnknownSymbol => None,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    codes: CodeMapper,
    currencies: HashMap<String, Currency>,
    markets: HashMap<MarketKey, Market>,
    active: HashSet<MarketKey>,
    symbols: HashMap<String, SymbolMapping>,
}

impl Tables {
    fn update_market(
        &mut self,
        native_symbol: &str,
        local_base: Option<&str>,
        local_curr: Option<&str>,
        fields: &MarketFields,
    ) -> UpdateOutcome {
        let mapping = match (local_base, local_curr) {
            (Some(base), Some(curr)) => SymbolMapping::resolve(&self.codes, base, curr),
            _ => match self.symbols.get(native_symbol) {
                Some(existing) if existing.is_resolved() => existing.clone(),
                Some(existing) => {
                    SymbolMapping::resolve(&self.codes, &existing.local_base, &existing.local_curr)
                }
                None => return UpdateOutcome::UnknownSymbol,
            },
        };
        let resolved = mapping.is_resolved();
        let key = self.remap_symbol(native_symbol, mapping);

        let market = self
            .markets
            .entry(key.clone())
            .or_insert_with(|| Market::new(native_symbol));
        market.native_symbol = native_symbol.to_string();
        fields.apply_to(market);
        let tradeable = market.is_tradeable();
        self.sync_active(&key, tradeable);

        if resolved {
            UpdateOutcome::Stored(key)
        } else {
            UpdateOutcome::Placeholder(key)
        }
    }

    /// 심볼 매핑을 저장하고, 키가 바뀌었으면 레코드를 옮깁니다.
    fn remap_symbol(&mut self, native_symbol: &str, mapping: SymbolMapping) -> MarketKey {
        let key = mapping.key();
        if let Some(previous) = self.symbols.get(native_symbol) {
            let old_key = previous.key();
            if old_key != key {
                self.migrate(native_symbol, &old_key, &key);
            }
        }
        self.symbols.insert(native_symbol.to_string(), mapping);
        key
    }

    /// 레코드를 새 키로 옮깁니다.
    ///
    /// 새 키에 이미 레코드가 있으면 저장된 레코드 위에 옮겨 온 레코드를 병합합니다.
    fn migrate(&mut self, native_symbol: &str, from: &MarketKey, to: &MarketKey) {
        self.active.remove(from);
        let Some(record) = self.markets.remove(from) else {
            return;
        };
        let tradeable = match self.markets.get_mut(to) {
            Some(existing) => {
                warn!(
                    symbol = %native_symbol,
                    from = %from,
                    to = %to,
                    existing = %existing.native_symbol,
                    "Market re-keyed onto an occupied key, merging records"
                );
                MarketFields::from(&record).apply_to(existing);
                existing.native_symbol = native_symbol.to_string();
                existing.is_tradeable()
            }
            None => {
                info!(symbol = %native_symbol, from = %from, to = %to, "Market re-keyed");
                let tradeable = record.is_tradeable();
                self.markets.insert(to.clone(), record);
                tradeable
            }
        };
        self.sync_active(to, tradeable);
    }

    fn sync_active(&mut self, key: &MarketKey, tradeable: bool) {
        if tradeable {
            self.active.insert(key.clone());
        } else {
            self.active.remove(key);
        }
    }

    /// 해석되지 않은 심볼 매핑을 다시 해석합니다. 해석에 성공한 수를 반환합니다.
    fn resolve_pending(&mut self) -> usize {
        let pending: Vec<(String, SymbolMapping)> = self
            .symbols
            .iter()
            .filter(|(_, mapping)| !mapping.is_resolved())
            .map(|(symbol, mapping)| (symbol.clone(), mapping.clone()))
            .collect();

        let mut resolved = 0;
        for (symbol, old) in pending {
            let fresh = SymbolMapping::resolve(&self.codes, &old.local_base, &old.local_curr);
            if fresh.is_resolved() {
                resolved += 1;
            }
            if fresh != old {
                self.remap_symbol(&symbol, fresh);
            }
        }
        resolved
    }

    fn nested(&self, keys: impl Iterator<Item = MarketKey>) -> BTreeMap<String, BTreeMap<String, Market>> {
        let mut result: BTreeMap<String, BTreeMap<String, Market>> = BTreeMap::new();
        for key in keys {
            if let Some(market) = self.markets.get(&key) {
                result
                    .entry(key.base.clone())
                    .or_default()
                    .insert(key.curr.clone(), market.clone());
            }
        }
        result
    }
}

/// 어댑터 하나가 소유하는 마켓 레지스트리.
#[derive(Debug)]
pub struct MarketRegistry {
    exchange: String,
    tables: RwLock<Tables>,
}

impl MarketRegistry {
    /// 이름 변경 테이블로 레지스트리를 생성합니다.
    pub fn new(exchange: impl Into<String>, renames: HashMap<String, String>) -> Self {
        Self::with_code_mapper(exchange, CodeMapper::new(renames))
    }

    /// 미리 구성한 매퍼로 레지스트리를 생성합니다.
    pub fn with_code_mapper(exchange: impl Into<String>, codes: CodeMapper) -> Self {
        Self {
            exchange: exchange.into(),
            tables: RwLock::new(Tables {
                codes,
                ..Default::default()
            }),
        }
    }

    /// 소유 거래소 이름.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    // =========================================================================
    // 쓰기
    // =========================================================================

    /// 마켓 레코드를 병합 갱신합니다.
    ///
    /// 병합 순서는 기본값, 저장된 레코드, 입력 필드입니다. 로컬 코드 없이
    /// 갱신되는 심볼은 이전에 등록된 매핑을 재사용합니다.
    pub fn update_market(
        &self,
        native_symbol: &str,
        local_base: Option<&str>,
        local_curr: Option<&str>,
        fields: &MarketFields,
    ) -> UpdateOutcome {
        let outcome = self.tables.write().unwrap().update_market(
            native_symbol,
            local_base,
            local_curr,
            fields,
        );
        if outcome == UpdateOutcome::UnknownSymbol {
            debug!(
                exchange = %self.exchange,
                symbol = %native_symbol,
                "Skipping update for unregistered market"
            );
        }
        outcome
    }

    /// 어댑터 갱신 하나를 적용합니다.
    pub fn apply(&self, update: &MarketUpdate) -> UpdateOutcome {
        self.update_market(
            &update.native_symbol,
            update.local_base.as_deref(),
            update.local_curr.as_deref(),
            &update.fields,
        )
    }

    /// 갱신 목록을 받은 순서대로 적용합니다. 저장된 갱신 수를 반환합니다.
    pub fn apply_all(&self, updates: &[MarketUpdate]) -> usize {
        let mut tables = self.tables.write().unwrap();
        let mut stored = 0;
        let mut skipped = 0;
        for update in updates {
            let outcome = tables.update_market(
                &update.native_symbol,
                update.local_base.as_deref(),
                update.local_curr.as_deref(),
                &update.fields,
            );
            match outcome {
                UpdateOutcome::UnknownSymbol => skipped += 1,
                _ => stored += 1,
            }
        }
        if skipped > 0 {
            debug!(
                exchange = %self.exchange,
                skipped,
                "Skipped updates for unregistered markets"
            );
        }
        stored
    }

    /// 통화 정의를 병합하고 코드를 등록합니다.
    ///
    /// 임시 키에 있던 마켓 중 새로 해석된 수를 반환합니다.
    pub fn update_currency_definitions(&self, definitions: &HashMap<String, CurrencyFields>) -> usize {
        let mut tables = self.tables.write().unwrap();
        for (local_code, fields) in definitions {
            let code = tables.codes.register(local_code);
            tables
                .currencies
                .entry(code.clone())
                .or_insert_with(|| Currency::new(code))
                .apply(fields);
        }
        let resolved = tables.resolve_pending();
        if resolved > 0 {
            info!(exchange = %self.exchange, resolved, "Placeholder markets resolved");
        }
        resolved
    }

    /// 이름 변경 테이블을 교체하고 모든 매핑을 다시 계산합니다.
    pub fn reconfigure_codes(&self, renames: HashMap<String, String>) {
        let mut tables = self.tables.write().unwrap();
        let before: HashMap<String, String> = tables
            .codes
            .registered()
            .map(|(local, global)| (local.to_string(), global.to_string()))
            .collect();
        tables.codes.reconfigure(renames);

        for (local, old_global) in before {
            let Some(new_global) = tables.codes.resolve_global(&local) else {
                continue;
            };
            if new_global == old_global || tables.currencies.contains_key(&new_global) {
                continue;
            }
            if let Some(mut currency) = tables.currencies.remove(&old_global) {
                currency.code = new_global.clone();
                tables.currencies.insert(new_global, currency);
            }
        }

        let symbols: Vec<(String, SymbolMapping)> = tables
            .symbols
            .iter()
            .map(|(symbol, mapping)| (symbol.clone(), mapping.clone()))
            .collect();
        for (symbol, old) in symbols {
            let fresh = SymbolMapping::resolve(&tables.codes, &old.local_base, &old.local_curr);
            if fresh != old {
                tables.remap_symbol(&symbol, fresh);
            }
        }
        info!(exchange = %self.exchange, "Currency code mapping reconfigured");
    }

    // =========================================================================
    // 읽기
    // =========================================================================

    /// 마켓 레코드를 조회합니다.
    pub fn get_market(&self, base: &str, curr: &str) -> Option<Market> {
        self.tables
            .read()
            .unwrap()
            .markets
            .get(&MarketKey::new(base, curr))
            .cloned()
    }

    /// 네이티브 심볼로 마켓을 조회합니다.
    pub fn get_market_by_symbol(&self, native_symbol: &str) -> Option<(MarketKey, Market)> {
        let tables = self.tables.read().unwrap();
        let key = tables.symbols.get(native_symbol)?.key();
        let market = tables.markets.get(&key)?.clone();
        Some((key, market))
    }

    /// 활성 마켓을 기준 통화 -> 거래 통화 -> 레코드로 반환합니다.
    pub fn get_active_markets(&self) -> BTreeMap<String, BTreeMap<String, Market>> {
        let tables = self.tables.read().unwrap();
        tables.nested(tables.active.iter().cloned())
    }

    /// 모든 마켓을 기준 통화 -> 거래 통화 -> 레코드로 반환합니다.
    pub fn get_markets(&self) -> BTreeMap<String, BTreeMap<String, Market>> {
        let tables = self.tables.read().unwrap();
        tables.nested(tables.markets.keys().cloned())
    }

    /// 활성 집합 포함 여부.
    pub fn is_active(&self, base: &str, curr: &str) -> bool {
        self.tables
            .read()
            .unwrap()
            .active
            .contains(&MarketKey::new(base, curr))
    }

    /// 마켓의 네이티브 심볼.
    pub fn get_market_symbol(&self, base: &str, curr: &str) -> Option<String> {
        self.get_market(base, curr).map(|m| m.native_symbol)
    }

    /// 심볼 매핑을 조회합니다.
    pub fn symbol_mapping(&self, native_symbol: &str) -> Option<SymbolMapping> {
        self.tables.read().unwrap().symbols.get(native_symbol).cloned()
    }

    /// 로컬 코드 -> 글로벌 코드.
    pub fn get_global_code(&self, local_code: &str) -> Option<String> {
        self.tables.read().unwrap().codes.resolve_global(local_code)
    }

    /// 글로벌 코드 -> 로컬 코드.
    pub fn get_local_code(&self, global_code: &str) -> Option<String> {
        self.tables.read().unwrap().codes.resolve_local(global_code)
    }

    /// 통화 레코드를 조회합니다.
    pub fn get_currency(&self, code: &str) -> Option<Currency> {
        self.tables.read().unwrap().currencies.get(code).cloned()
    }

    /// 모든 통화 레코드.
    pub fn currencies(&self) -> BTreeMap<String, Currency> {
        self.tables
            .read()
            .unwrap()
            .currencies
            .iter()
            .map(|(code, currency)| (code.clone(), currency.clone()))
            .collect()
    }

    pub fn market_count(&self) -> usize {
        self.tables.read().unwrap().markets.len()
    }

    pub fn active_count(&self) -> usize {
        self.tables.read().unwrap().active.len()
    }
}
