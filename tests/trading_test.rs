//! End-to-end tests for the trading game
//!
//! Tests cover:
//! - Buy / advance / sell rounds
//! - FIFO lot consumption
//! - Balance and inventory arithmetic
//! - Restart and game-over behavior
//! - Users on different days trading the same product
//! - Analytics after trades and day advances

mod common;

use common::{test_game, ACME, BOLT, IDX};
use stock_sim::services::TradingError;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Trade Round Tests
// =============================================================================

mod round_tests {
    use super::*;

    #[test]
    fn test_buy_advance_sell() {
        let game = test_game();
        game.trading.init_game("alice", Some(500_000.0), Some(30)).unwrap();

        let bought = game.trading.buy("alice", ACME, 10).unwrap();
        assert_eq!(bought.balance, 499_000.0);
        let lots = game.trading.list_lots("alice", Some(ACME)).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 10);
        assert_eq!(lots[0].buy_price, 100.0);

        let advance = game.clock.advance_day("alice").unwrap();
        let acme = advance.prices.iter().find(|p| p.product_id == ACME).unwrap();
        assert_eq!(acme.price, 110.0);

        let sold = game.trading.sell("alice", ACME, 10).unwrap();
        assert_eq!(sold.summary.total_profit, 100.0);
        assert_eq!(sold.balance, 500_100.0);
        assert!(game.trading.list_lots("alice", Some(ACME)).unwrap().is_empty());
    }

    #[test]
    fn test_sell_spanning_two_lots() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();

        let older = game.trading.buy("alice", ACME, 10).unwrap();
        game.clock.advance_day("alice").unwrap();
        let newer = game.trading.buy("alice", ACME, 10).unwrap();
        assert_ne!(older.lot_id, newer.lot_id);
        assert_eq!(newer.price, 110.0);

        let sold = game.trading.sell("alice", ACME, 15).unwrap();
        assert_eq!(sold.lots.len(), 2);
        assert_eq!(sold.lots[0].lot_id, older.lot_id);
        assert_eq!(sold.lots[0].quantity, 10);
        assert!(sold.lots[0].closed);
        assert_eq!(sold.lots[1].lot_id, newer.lot_id);
        assert_eq!(sold.lots[1].quantity, 5);
        assert_eq!(sold.summary.total_profit, 100.0);

        let lots = game.trading.list_lots("alice", Some(ACME)).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].id, newer.lot_id);
        assert_eq!(lots[0].quantity, 5);
    }

    #[test]
    fn test_small_sell_leaves_newer_lots_untouched() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();

        game.trading.buy("alice", BOLT, 20).unwrap();
        game.clock.advance_day("alice").unwrap();
        game.trading.buy("alice", BOLT, 7).unwrap();

        game.trading.sell("alice", BOLT, 20).unwrap();

        let lots = game.trading.list_lots("alice", Some(BOLT)).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 7);
        assert_eq!(lots[0].buy_price, 45.0);
    }

    #[test]
    fn test_balance_and_inventory_arithmetic() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();

        let before = game.trading.game_status("alice").unwrap().balance;
        let bought = game.trading.buy("alice", IDX, 300).unwrap();
        assert_eq!(bought.balance, before - 300.0 * 10.0);
        assert_eq!(bought.remaining_inventory, 1700);

        game.clock.advance_day("alice").unwrap();
        game.clock.advance_day("alice").unwrap();

        let sold = game.trading.sell("alice", IDX, 120).unwrap();
        assert!((sold.balance - (bought.balance + 120.0 * 10.4)).abs() < 1e-6);
        assert_eq!(sold.remaining_inventory, 1820);
        assert!((sold.summary.total_profit - 120.0 * 0.4).abs() < 1e-6);
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_full_game_ends_after_max_day() {
        let game = test_game();
        game.trading.init_game("alice", None, Some(5)).unwrap();

        for expected_remaining in (0..5).rev() {
            let advance = game.clock.advance_day("alice").unwrap();
            assert_eq!(advance.remain_days, expected_remaining);
        }

        assert!(matches!(
            game.clock.advance_day("alice"),
            Err(TradingError::GameAlreadyOver)
        ));
        let status = game.trading.game_status("alice").unwrap();
        assert_eq!(status.remain_days, 0);
        assert!(status.game_over);
    }

    #[test]
    fn test_restart_twice_matches_restart_once() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.buy("alice", ACME, 5).unwrap();
        game.trading.buy("alice", IDX, 50).unwrap();

        game.trading.restart_game("alice").unwrap();
        let once = game.trading.products(None).unwrap();

        game.trading.restart_game("alice").unwrap();
        let twice = game.trading.products(None).unwrap();

        let quantities = |products: &[stock_sim::types::Product]| {
            products
                .iter()
                .map(|p| p.available_quantity)
                .collect::<Vec<_>>()
        };
        assert_eq!(quantities(&once), vec![1000, 1000, 2000]);
        assert_eq!(quantities(&once), quantities(&twice));
    }

    #[test]
    fn test_restart_resets_inventory_taken_by_other_users() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.init_game("bob", None, None).unwrap();
        game.trading.buy("bob", ACME, 100).unwrap();

        game.trading.restart_game("alice").unwrap();

        let acme = &game.trading.products(None).unwrap()[0];
        assert_eq!(acme.available_quantity, 1000);
        // Bob keeps his lots
        assert_eq!(game.trading.list_lots("bob", None).unwrap().len(), 1);
    }

    #[test]
    fn test_users_keep_separate_days() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.init_game("bob", None, Some(3)).unwrap();

        game.clock.advance_day("alice").unwrap();
        game.clock.advance_day("alice").unwrap();
        game.clock.advance_day("bob").unwrap();

        assert_eq!(game.trading.game_status("alice").unwrap().current_day, 2);
        let bob = game.trading.game_status("bob").unwrap();
        assert_eq!(bob.current_day, 1);
        assert_eq!(bob.remain_days, 2);
    }
}

// =============================================================================
// Per-User Day Tests
// =============================================================================

mod isolation_tests {
    use super::*;

    #[test]
    fn test_other_user_init_keeps_sell_price() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.buy("alice", ACME, 10).unwrap();
        game.clock.advance_day("alice").unwrap();

        game.trading.init_game("bob", None, None).unwrap();

        let sold = game.trading.sell("alice", ACME, 10).unwrap();
        assert_eq!(sold.sell_price, 110.0);
        assert_eq!(sold.summary.total_profit, 100.0);
    }

    #[test]
    fn test_other_user_advance_keeps_sell_price() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.init_game("bob", None, None).unwrap();
        game.trading.buy("alice", ACME, 10).unwrap();

        for _ in 0..3 {
            game.clock.advance_day("bob").unwrap();
        }

        let sold = game.trading.sell("alice", ACME, 10).unwrap();
        assert_eq!(game.trading.game_status("alice").unwrap().current_day, 0);
        assert_eq!(sold.sell_price, 100.0);
        assert_eq!(sold.summary.total_profit, 0.0);
    }

    #[test]
    fn test_users_on_different_days_trade_same_product() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.init_game("bob", None, None).unwrap();

        game.clock.advance_day("alice").unwrap();
        game.clock.advance_day("bob").unwrap();
        game.clock.advance_day("bob").unwrap();

        let alice = game.trading.buy("alice", ACME, 5).unwrap();
        let bob = game.trading.buy("bob", ACME, 5).unwrap();
        assert_eq!(alice.price, 110.0);
        assert_eq!(bob.price, 104.5);

        // Inventory is shared
        assert_eq!(bob.remaining_inventory, 990);

        let alice_view = game.trading.portfolio("alice").unwrap();
        let bob_view = game.trading.portfolio("bob").unwrap();
        assert_eq!(alice_view.portfolio_value, 550.0);
        assert_eq!(bob_view.portfolio_value, 522.5);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_mixed_trades_never_go_negative() {
        let game = test_game();
        game.trading.init_game("alice", Some(2_000.0), None).unwrap();
        game.trading.init_game("bob", Some(2_000.0), None).unwrap();

        let handles: Vec<_> = ["alice", "bob"]
            .into_iter()
            .flat_map(|user| {
                (0..6).map(move |i| (user, i))
            })
            .map(|(user, i)| {
                let trading = Arc::clone(&game.trading);
                thread::spawn(move || {
                    if i % 3 == 2 {
                        let _ = trading.sell(user, BOLT, 10);
                    } else {
                        let _ = trading.buy(user, BOLT, 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut held = 0;
        for user in ["alice", "bob"] {
            let status = game.trading.game_status(user).unwrap();
            assert!(status.balance >= 0.0);

            let lots = game.trading.list_lots(user, Some(BOLT)).unwrap();
            let quantity: i64 = lots.iter().map(|l| l.quantity).sum();
            assert!(lots.iter().all(|l| l.quantity > 0));

            // Price never moved, so cash plus holdings is conserved
            assert_eq!(status.balance + quantity as f64 * 50.0, 2_000.0);
            held += quantity;
        }

        let bolt = &game.trading.products(None).unwrap()[1];
        assert!(bolt.available_quantity >= 0);
        assert_eq!(bolt.available_quantity + held, 1000);
    }

    #[test]
    fn test_concurrent_advances_stop_at_zero() {
        let game = test_game();
        game.trading.init_game("alice", None, Some(3)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&game.clock);
                thread::spawn(move || clock.advance_day("alice").is_ok())
            })
            .collect();
        let advanced = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(advanced, 3);
        let status = game.trading.game_status("alice").unwrap();
        assert_eq!(status.remain_days, 0);
        assert_eq!(status.current_day, 3);
    }
}

// =============================================================================
// Analytics Tests
// =============================================================================

mod analytics_tests {
    use super::*;

    #[test]
    fn test_history_tracks_each_day() {
        let game = test_game();
        game.trading.init_game("alice", Some(10_000.0), None).unwrap();
        game.trading.buy("alice", ACME, 10).unwrap();

        game.clock.advance_day("alice").unwrap();
        game.clock.advance_day("alice").unwrap();

        let history = game.trading.assets_history("alice").unwrap();
        let totals: Vec<(i64, f64)> = history.iter().map(|r| (r.day, r.total_assets)).collect();
        assert_eq!(
            totals,
            vec![(0, 10_000.0), (1, 10_100.0), (2, 10_045.0)]
        );
    }

    #[test]
    fn test_performance_after_partial_sell() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.buy("alice", ACME, 10).unwrap();
        game.clock.advance_day("alice").unwrap();
        game.trading.sell("alice", ACME, 4).unwrap();

        let performance = game.trading.performance("alice").unwrap();
        assert_eq!(performance.summary.realized_profit, 40.0);
        assert_eq!(performance.summary.unrealized_profit, 60.0);
        assert_eq!(performance.realized[0].transactions.len(), 1);
        assert_eq!(performance.unrealized[0].quantity, 6);
    }

    #[test]
    fn test_restart_clears_analytics() {
        let game = test_game();
        game.trading.init_game("alice", None, None).unwrap();
        game.trading.buy("alice", ACME, 10).unwrap();
        game.clock.advance_day("alice").unwrap();
        game.trading.sell("alice", ACME, 10).unwrap();

        game.trading.restart_game("alice").unwrap();
        game.trading.init_game("alice", None, None).unwrap();

        let performance = game.trading.performance("alice").unwrap();
        assert!(performance.realized.is_empty());
        assert_eq!(performance.summary.total_profit, 0.0);
        assert_eq!(game.trading.assets_history("alice").unwrap().len(), 1);
    }
}
