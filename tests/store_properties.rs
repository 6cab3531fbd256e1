use martrello_core::{Board, BoardStore, Card, EntityId, List};
use proptest::prelude::*;

const LISTS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    InsertCard { list: usize, index: usize },
    RemoveCard { card: usize },
    MoveCard { card: usize, list: usize, index: usize },
    MoveList { from: usize, to: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..LISTS, 0..8usize).prop_map(|(list, index)| Op::InsertCard { list, index }),
        (0..32usize).prop_map(|card| Op::RemoveCard { card }),
        (0..32usize, 0..LISTS, 0..8usize)
            .prop_map(|(card, list, index)| Op::MoveCard { card, list, index }),
        (0..LISTS, 0..LISTS + 1).prop_map(|(from, to)| Op::MoveList { from, to }),
    ]
}

fn list_id(n: usize) -> EntityId {
    EntityId::new(format!("l{}", n))
}

/// Board "b" with lists "l0".."l2"; "l0" starts with cards "c0".."c3"
fn seeded_store() -> BoardStore {
    let mut store = BoardStore::new();
    store
        .insert_board(Board::new(EntityId::new("b"), "Board".to_string()))
        .unwrap();
    for n in 0..LISTS {
        store
            .insert_list(
                &EntityId::new("b"),
                List::new(list_id(n), EntityId::new("b"), format!("List {}", n)),
                n,
            )
            .unwrap();
    }
    for n in 0..4 {
        let id = EntityId::new(format!("c{}", n));
        store
            .insert_card(&list_id(0), Card::new(id, list_id(0), format!("Card {}", n)), n)
            .unwrap();
    }
    store
}

fn card_ids(store: &BoardStore) -> Vec<EntityId> {
    store
        .boards()
        .iter()
        .flat_map(|board| board.lists.iter())
        .flat_map(|list| list.cards.iter().map(|card| card.id.clone()))
        .collect()
}

fn apply(store: &mut BoardStore, op: &Op, next_id: &mut usize) {
    let cards = card_ids(store);
    match *op {
        Op::InsertCard { list, index } => {
            let id = EntityId::new(format!("n{}", next_id));
            *next_id += 1;
            store
                .insert_card(&list_id(list), Card::new(id, list_id(list), "New".to_string()), index)
                .unwrap();
        }
        Op::RemoveCard { card } if !cards.is_empty() => {
            store.remove_card(&cards[card % cards.len()]).unwrap();
        }
        Op::MoveCard { card, list, index } if !cards.is_empty() => {
            store
                .move_card(&cards[card % cards.len()], &list_id(list), index)
                .unwrap();
        }
        Op::MoveList { from, to } => {
            store.move_list(&EntityId::new("b"), from, to).unwrap();
        }
        _ => {}
    }
}

fn positions_are_dense(store: &BoardStore) -> bool {
    store.boards().iter().all(|board| {
        board.lists.iter().enumerate().all(|(i, list)| {
            list.position == i
                && list
                    .cards
                    .iter()
                    .enumerate()
                    .all(|(j, card)| card.position == j && card.list_id == list.id)
        })
    })
}

proptest! {
    #[test]
    fn prop_positions_stay_dense(ops in proptest::collection::vec(op(), 0..40)) {
        let mut store = seeded_store();
        let mut next_id = 0;

        for op in &ops {
            apply(&mut store, op, &mut next_id);
            prop_assert!(store.check_invariants().is_ok(), "after {:?}", op);
            prop_assert!(positions_are_dense(&store), "after {:?}", op);
        }
    }

    #[test]
    fn prop_move_away_and_back_restores_source_list(
        ops in proptest::collection::vec(op(), 0..20),
        pick in 0..32usize,
        away in 0..LISTS - 1,
        away_index in 0..8usize,
    ) {
        let mut store = seeded_store();
        let mut next_id = 0;
        for op in &ops {
            apply(&mut store, op, &mut next_id);
        }
        let cards = card_ids(&store);
        prop_assume!(!cards.is_empty());

        let card = &cards[pick % cards.len()];
        let origin = store.card_location(card).unwrap();
        let source_before = store.list(&origin.list_id).unwrap().cards.clone();
        let others: Vec<EntityId> = store.boards()[0]
            .lists
            .iter()
            .map(|list| list.id.clone())
            .filter(|id| *id != origin.list_id)
            .collect();
        let away_list = &others[away % others.len()];

        store.move_card(card, away_list, away_index).unwrap();
        store.move_card(card, &origin.list_id, origin.index).unwrap();

        prop_assert_eq!(&store.list(&origin.list_id).unwrap().cards, &source_before);
    }

    #[test]
    fn prop_restore_returns_identical_tree(ops in proptest::collection::vec(op(), 1..30)) {
        let mut store = seeded_store();
        let mut next_id = 0;
        let snapshot = store.snapshot();
        let encoded = serde_json::to_string(snapshot.boards()).unwrap();

        for op in &ops {
            apply(&mut store, op, &mut next_id);
        }
        store.restore(snapshot.clone());

        prop_assert_eq!(store.boards(), snapshot.boards());
        prop_assert_eq!(serde_json::to_string(store.boards()).unwrap(), encoded);
        prop_assert!(store.revision() > snapshot.revision());
    }
}
