//! Demonstration of a reducer-driven store managing a todo list

use std::sync::Arc;

use snapstore::{bind, ExternalStore, ReducerStore, ShallowMerge, SyncedSnapshot};

#[derive(Clone, Debug)]
struct TodoItem {
    id: usize,
    title: String,
    completed: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum TodoFilter {
    All,
    Active,
    Completed,
}

#[derive(Clone, Debug)]
struct AppState {
    todos: Arc<Vec<TodoItem>>,
    filter: TodoFilter,
}

/// Fields to replace in [`AppState`].
#[derive(Default)]
struct AppPatch {
    todos: Option<Vec<TodoItem>>,
    filter: Option<TodoFilter>,
}

impl ShallowMerge for AppState {
    type Partial = AppPatch;

    fn merge(&self, partial: AppPatch) -> Self {
        Self {
            todos: partial
                .todos
                .map(Arc::new)
                .unwrap_or_else(|| Arc::clone(&self.todos)),
            filter: partial.filter.unwrap_or_else(|| self.filter.clone()),
        }
    }
}

enum Action {
    Add(&'static str),
    Toggle(usize),
    Filter(TodoFilter),
}

fn reduce(state: &AppState, action: Action) -> AppPatch {
    match action {
        Action::Add(title) => {
            let mut todos = state.todos.to_vec();
            todos.push(TodoItem {
                id: todos.len(),
                title: title.to_string(),
                completed: false,
            });
            AppPatch {
                todos: Some(todos),
                ..AppPatch::default()
            }
        }
        Action::Toggle(id) => {
            let mut todos = state.todos.to_vec();
            if let Some(todo) = todos.iter_mut().find(|t| t.id == id) {
                todo.completed = !todo.completed;
            }
            AppPatch {
                todos: Some(todos),
                ..AppPatch::default()
            }
        }
        Action::Filter(filter) => AppPatch {
            filter: Some(filter),
            ..AppPatch::default()
        },
    }
}

impl AppState {
    fn new() -> Self {
        Self {
            todos: Arc::new(Vec::new()),
            filter: TodoFilter::All,
        }
    }

    fn filtered_todos(&self) -> Vec<&TodoItem> {
        match self.filter {
            TodoFilter::All => self.todos.iter().collect(),
            TodoFilter::Active => self.todos.iter().filter(|t| !t.completed).collect(),
            TodoFilter::Completed => self.todos.iter().filter(|t| t.completed).collect(),
        }
    }

    fn stats(&self) -> (usize, usize, usize) {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|t| t.completed).count();
        let active = total - completed;
        (total, active, completed)
    }
}

fn print_visible(store: &ReducerStore<AppState, Action>) {
    store.store().read(|state| {
        for todo in state.filtered_todos() {
            let status = if todo.completed { "✓" } else { " " };
            println!("   [{}] {}", status, todo.title);
        }
    });
}

fn main() -> snapstore::Result<()> {
    println!("=== Store Example: Todo App ===\n");

    let store = ReducerStore::new(AppState::new(), reduce);

    // Stats only change when the list does, not when the filter does.
    println!("1. Setting up stats display");
    let _stats = SyncedSnapshot::new(bind(store.clone(), AppState::stats), |stats| {
        if let Ok(stats) = stats {
            let (total, active, completed) = *stats;
            println!(
                "   [Stats] Total: {}, Active: {}, Completed: {}",
                total, active, completed
            );
        }
    })
    .unwrap_or_else(|never| match never {});

    println!("\n2. Adding todos");
    store.dispatch(Action::Add("Learn Rust"))?;
    store.dispatch(Action::Add("Build a state store"))?;
    store.dispatch(Action::Add("Write documentation"))?;

    println!("\n3. Current todos:");
    print_visible(&store);

    println!("\n4. Completing first todo");
    store.dispatch(Action::Toggle(0))?;

    println!("\n5. Filtering to show only active todos (no stats update)");
    store.dispatch(Action::Filter(TodoFilter::Active))?;
    print_visible(&store);

    println!("\n6. Filtering to show completed todos");
    store.dispatch(Action::Filter(TodoFilter::Completed))?;
    print_visible(&store);

    let (total, active, completed) = store.get_state().stats();
    println!("\n7. Final statistics:");
    println!("   Total: {}", total);
    println!("   Active: {}", active);
    println!("   Completed: {}", completed);

    println!("\n✓ Example complete!");
    Ok(())
}
