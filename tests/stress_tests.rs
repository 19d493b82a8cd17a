//! Stress tests
//!
//! These tests push the provider to its edges: exhausted vaults, amounts near the
//! numeric ceiling, many positions at once and racing closers.

use ccmt_core::*;
use rust_decimal::Decimal;
use std::thread;

fn dai() -> Address {
    ProviderConfig::local().supported_assets[0]
}

fn funded(amount: Amount) -> Registry {
    let mut registry = Registry::new(ProviderConfig::local()).unwrap();
    let funder = Address::from_low_u64(0xf00d);
    registry.fund_account(dai(), funder, amount).unwrap();
    registry.deposit(dai(), funder, amount).unwrap();
    registry
}

/// End-to-end flows through the mock protocol.
mod lifecycle_tests {
    use super::*;

    #[test]
    fn open_fill_close_splits_nine_to_one() {
        let mut registry = funded(Amount::units(1_000));
        let trader = Address::from_low_u64(0x7ade);
        let taker = Address::from_low_u64(0x7a4e);
        let counterparty = Address::from_low_u64(0xc0c0);
        registry.fund_account(dai(), taker, Amount::units(50)).unwrap();

        let id = registry.open_position(dai(), Amount::units(1_000), trader).unwrap();
        assert_eq!(id, PositionId(1));
        assert_eq!(registry.free_liquidity(dai()), Amount::zero());

        // margin code 2 at the default 500 bps step
        let protocol = MockProtocol::new(registry.protocol());
        let order = RestingOrder::new(trader, id, dai(), Amount::units(50))
            .with_interaction(Interaction::new(counterparty, 2));
        let view = protocol.fill_order(&mut registry, &order, taker).unwrap();
        assert_eq!(view.margin_bps, Bps::new(1_000));
        assert_eq!(view.counterparty, Some(counterparty));

        let closed = registry.close_trade(taker, id).unwrap();
        assert_eq!(closed.holder, taker);
        assert_eq!(closed.plan.holder_share, Amount::units(900));
        assert_eq!(closed.plan.counterparty_share, Amount::units(100));

        assert_eq!(registry.balance_of(dai(), taker), Amount::units(900));
        assert_eq!(registry.balance_of(dai(), counterparty), Amount::units(100));
        assert_eq!(registry.balance_of(dai(), trader), Amount::units(50));
        assert_eq!(registry.vault_balance(dai()), Amount::zero());

        assert_eq!(registry.owner_of(id), Err(ProviderError::NotFound(id)));
        assert_eq!(
            TokenError::NonexistentToken(id).to_string(),
            "owner query for nonexistent token #1"
        );
        assert!(matches!(registry.get_trade_info(id), Err(ProviderError::NotFound(_))));
        assert_eq!(registry.position_record(id).unwrap().state, PositionState::Closed);
        registry.verify_invariants().unwrap();
    }

    #[test]
    fn event_trail_follows_the_lifecycle() {
        let mut registry = funded(Amount::units(100));
        let holder = Address::from_low_u64(0x1);
        let id = registry.open_position(dai(), Amount::units(100), holder).unwrap();
        let protocol = registry.protocol();
        registry
            .register_fill(protocol, id, Address::from_low_u64(0xc), Bps::new(2_500))
            .unwrap();
        registry.close_trade(holder, id).unwrap();

        let kinds: Vec<&str> = registry
            .events()
            .iter()
            .map(|e| match &e.payload {
                EventPayload::VaultDeposit(_) => "deposit",
                EventPayload::VaultWithdrawal(_) => "withdrawal",
                EventPayload::TokenTransfer(t) if t.from.is_none() => "mint",
                EventPayload::TokenTransfer(t) if t.to.is_none() => "burn",
                EventPayload::TokenTransfer(_) => "transfer",
                EventPayload::PositionOpened(_) => "opened",
                EventPayload::PositionFilled(_) => "filled",
                EventPayload::SettlementPayout(_) => "payout",
                EventPayload::PositionClosed(_) => "closed",
                EventPayload::PositionCancelled(_) => "cancelled",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["deposit", "mint", "opened", "filled", "payout", "payout", "burn", "closed"]
        );

        let json = registry.events().last().unwrap().to_json().unwrap();
        assert!(json.contains("\"type\":\"position_closed\""));
    }

    #[test]
    fn cancelled_position_frees_liquidity_for_the_next() {
        let mut registry = funded(Amount::units(1_000));
        let holder = Address::from_low_u64(0x1);
        let first = registry.open_position(dai(), Amount::units(1_000), holder).unwrap();
        assert!(registry.open_position(dai(), Amount::units(1), holder).is_err());

        registry.cancel_position(holder, first).unwrap();
        assert_eq!(registry.free_liquidity(dai()), Amount::units(1_000));

        let second = registry.open_position(dai(), Amount::units(1_000), holder).unwrap();
        assert_eq!(second, PositionId(2));
        registry.verify_invariants().unwrap();
    }

    #[test]
    fn kovan_preset_rejects_local_assets() {
        let admin = Address::from_low_u64(0xad);
        let mut registry = Registry::new(ProviderConfig::kovan(admin).unwrap()).unwrap();
        assert_eq!(registry.config().chain_id, Network::Kovan.chain_id());

        let result = registry.open_position(dai(), Amount::units(1), admin);
        assert_eq!(result, Err(ProviderError::InvalidAsset(dai())));
    }
}

/// Running the vault dry.
mod exhaustion_tests {
    use super::*;

    #[test]
    fn second_open_rejected_when_vault_is_short() {
        let mut registry = funded(Amount::units(1_500));
        let owner = Address::from_low_u64(0x1);
        let first = registry.open_position(dai(), Amount::units(1_000), owner).unwrap();

        let result = registry.open_position(dai(), Amount::units(1_000), owner);
        assert_eq!(
            result,
            Err(ProviderError::InsufficientVaultBalance {
                asset: dai(),
                available: Amount::units(500),
                requested: Amount::units(1_000),
            })
        );

        assert_eq!(registry.get_trade_info(first).unwrap().state, PositionState::Open);
        assert_eq!(registry.open_interest(dai()), Amount::units(1_000));
        assert_eq!(registry.token().total_supply(), 1);
        assert_eq!(registry.position_count(), 1);
    }

    #[test]
    fn many_positions_drain_exactly_to_zero() {
        let mut registry = funded(Amount::units(10_000));
        let owner = Address::from_low_u64(0x1);

        let ids: Vec<PositionId> = (0..100)
            .map(|_| registry.open_position(dai(), Amount::units(100), owner).unwrap())
            .collect();
        assert_eq!(registry.free_liquidity(dai()), Amount::zero());
        assert!(registry.open_position(dai(), Amount::units(1), owner).is_err());
        assert_eq!(registry.token().balance_of(owner), 100);

        let protocol = registry.protocol();
        for (i, id) in ids.iter().enumerate() {
            let margin = Bps::new((i as u32 % 21) * 500);
            registry
                .register_fill(protocol, *id, Address::from_low_u64(0xc), margin)
                .unwrap();
            registry.close_trade(owner, *id).unwrap();
        }

        assert_eq!(registry.vault_balance(dai()), Amount::zero());
        let paid = registry
            .balance_of(dai(), owner)
            .checked_add(registry.balance_of(dai(), Address::from_low_u64(0xc)))
            .unwrap();
        assert_eq!(paid, Amount::units(10_000));
        assert_eq!(registry.token().total_minted(), 100);
        assert_eq!(registry.token().total_burned(), 100);
        registry.verify_invariants().unwrap();
    }

    #[test]
    fn admin_cannot_withdraw_reserved_collateral() {
        let mut registry = funded(Amount::units(1_000));
        let admin = registry.config().admin;
        registry
            .open_position(dai(), Amount::units(800), Address::from_low_u64(0x1))
            .unwrap();

        assert!(registry.withdraw_free(admin, dai(), Amount::units(201), admin).is_err());
        registry.withdraw_free(admin, dai(), Amount::units(200), admin).unwrap();
        assert_eq!(registry.vault_balance(dai()), Amount::units(800));
        assert_eq!(registry.free_liquidity(dai()), Amount::zero());
    }
}

/// Amounts near the top of the representable range.
mod overflow_tests {
    use super::*;

    fn huge() -> Amount {
        Amount::new(Decimal::from_i128_with_scale(40_000_000_000_000_000_000_000_000_000, 0)).unwrap()
    }

    #[test]
    fn full_margin_on_huge_collateral_settles() {
        let mut registry = funded(huge());
        let holder = Address::from_low_u64(0x1);
        let counterparty = Address::from_low_u64(0xc);
        let id = registry.open_position(dai(), huge(), holder).unwrap();
        let protocol = registry.protocol();
        registry
            .register_fill(protocol, id, counterparty, Bps::new(MAX_MARGIN_BPS))
            .unwrap();

        let closed = registry.close_trade(holder, id).unwrap();
        assert_eq!(closed.plan.counterparty_share, huge());
        assert_eq!(closed.plan.holder_share, Amount::zero());
        assert_eq!(registry.balance_of(dai(), counterparty), huge());
        assert_eq!(registry.open_interest(dai()), Amount::zero());
        assert_eq!(registry.vault_balance(dai()), Amount::zero());
        registry.verify_invariants().unwrap();
    }

    #[test]
    fn every_tier_settles_at_the_numeric_ceiling() {
        let ceiling = Amount::new(Decimal::MAX).unwrap();
        let holder = Address::from_low_u64(0x1);
        let protocol = ProviderConfig::local().protocol;

        for code in 0..=20u32 {
            let mut registry = funded(ceiling);
            let id = registry.open_position(dai(), ceiling, holder).unwrap();
            registry
                .register_fill(protocol, id, Address::from_low_u64(0xc), Bps::new(code * 500))
                .unwrap();

            let closed = registry.close_trade(holder, id).unwrap();
            assert_eq!(closed.plan.total_paid(), ceiling, "margin code {}", code);
            assert_eq!(registry.vault_balance(dai()), Amount::zero());
        }
    }

    #[test]
    fn payout_that_would_overflow_recipient_is_refused() {
        let mut registry = funded(huge());
        let holder = Address::from_low_u64(0x1);
        registry.fund_account(dai(), holder, huge()).unwrap();
        let id = registry.open_position(dai(), huge(), holder).unwrap();
        let protocol = registry.protocol();
        registry
            .register_fill(protocol, id, Address::from_low_u64(0xc), Bps::zero())
            .unwrap();

        let result = registry.close_trade(holder, id);
        assert!(matches!(result, Err(ProviderError::ArithmeticOverflow(_))));
        assert_eq!(registry.balance_of(dai(), holder), huge());
        assert_eq!(registry.vault_balance(dai()), huge());
    }
}

/// Many threads against one shared registry.
mod concurrency_tests {
    use super::*;

    #[test]
    fn racing_closes_settle_once() {
        let mut registry = funded(Amount::units(1_000));
        let holder = Address::from_low_u64(0x1);
        let counterparty = Address::from_low_u64(0xc);
        let id = registry.open_position(dai(), Amount::units(1_000), holder).unwrap();
        let protocol = registry.protocol();
        registry.register_fill(protocol, id, counterparty, Bps::new(1_000)).unwrap();

        let shared = SharedRegistry::new(registry);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.transact(|r| r.close_trade(holder, id)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ProviderError::NotFound(_))));

        shared.read(|r| {
            assert_eq!(r.balance_of(dai(), holder), Amount::units(900));
            assert_eq!(r.balance_of(dai(), counterparty), Amount::units(100));
            assert_eq!(r.vault_balance(dai()), Amount::zero());
            r.verify_invariants().unwrap();
        });
    }

    #[test]
    fn concurrent_opens_never_overcommit() {
        let shared = SharedRegistry::new(funded(Amount::units(1_000)));

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.transact(|r| r.open_position(dai(), Amount::units(100), Address::from_low_u64(i + 1)))
                })
            })
            .collect();
        let opened = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(opened, 10);
        shared.read(|r| {
            assert_eq!(r.free_liquidity(dai()), Amount::zero());
            assert_eq!(r.token().total_supply(), 10);
            r.verify_invariants().unwrap();
        });
    }
}
